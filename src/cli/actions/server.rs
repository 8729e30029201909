use crate::api;
use crate::cli::{actions::Action, globals::GlobalArgs};
use crate::mailer::SmtpConfig;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub environment: String,
    pub migrate: bool,
    pub session_secret: SecretString,
    pub smtp: SmtpConfig,
}

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server { args } => {
            let globals = GlobalArgs::new(&args);

            api::new(args.port, args.dsn, &globals).await?;
        }
    }

    Ok(())
}
