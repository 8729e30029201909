//! # Identeco (User Identity & Account Management)
//!
//! `identeco` is a user-identity backend: registration, credential
//! verification, session issuance, email-based account activation, and
//! password-reset token lifecycle, fronted by a REST API over PostgreSQL.
//!
//! ## Tokens
//!
//! Account activation and password reset both rest on single-use,
//! high-entropy tokens. The plaintext is shown to the user exactly once
//! (in an email); the database only ever stores a SHA-256 digest of it,
//! together with the owning user, a scope, and an absolute expiry.
//! Consuming a token deletes every token of that scope for the user, so
//! sibling tokens (e.g. from repeated reset emails) die with it.
//!
//! ## Sessions
//!
//! Sessions are stateless: a signed claims payload carried in an
//! `HttpOnly` cookie (or `Authorization: Bearer` header), verified
//! per-request against a server-held symmetric secret. Nothing is stored
//! server-side.
//!
//! ## Errors
//!
//! Stores return typed error kinds, never raw transport errors; workflows
//! translate those into the HTTP taxonomy. "Not found" outcomes on token
//! and credential lookups are deliberately indistinguishable from "wrong"
//! or "expired" to avoid resource enumeration.

pub mod api;
pub mod cli;
pub mod domain;
pub mod mailer;
pub mod service;
pub mod session;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
