use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;
use tollgate_api::{ApiClient, ClientConfig, ClientConfigOverrides};

use crate::notify::TerminalNotifier;

pub mod auth;
pub mod config;
pub mod request;

pub use auth::{Credentials, ForgotPasswordArgs};
pub use config::ConfigCommands;
pub use request::RequestArgs;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Get CLI Version
    Version,

    /// Inspect or create the config file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Check credentials against the login endpoint
    Login(Credentials),

    /// Ask the backend to send a password reset email
    ForgotPassword(ForgotPasswordArgs),

    /// Send one or more authenticated requests
    Request(RequestArgs),
}

impl Commands {
    pub async fn run(
        self,
        config_path: Option<&Path>,
        overrides: &ClientConfigOverrides,
    ) -> anyhow::Result<()> {
        match self {
            Commands::Version => {
                println!("tollgate v{}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
            Commands::Config(command) => command.run(config_path, overrides),
            Commands::Login(credentials) => {
                let client = build_client(config_path, overrides)?;
                auth::login(&client, credentials).await
            }
            Commands::ForgotPassword(args) => {
                let client = build_client(config_path, overrides)?;
                auth::forgot_password(&client, args).await
            }
            Commands::Request(args) => {
                let client = build_client(config_path, overrides)?;
                request::run(&client, args).await
            }
        }
    }
}

fn build_client(
    config_path: Option<&Path>,
    overrides: &ClientConfigOverrides,
) -> anyhow::Result<ApiClient> {
    let config = ClientConfig::load(config_path, overrides)?;
    tracing::debug!(base_url = %config.base_url, "using API");

    let client = ApiClient::builder(config)
        .with_notifier(Arc::new(TerminalNotifier))
        .build()?;
    Ok(client)
}
