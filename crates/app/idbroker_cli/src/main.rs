//! Identity broker operator CLI.
//!
//! Reads configuration from the environment (and `.env`), logs to stderr and
//! prints JSON to stdout.

pub use self::error::{Error, Result};
mod error;

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use idbroker_core::BrokerConfig;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,idbroker_core=debug")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Cli) -> Result<()> {
    let config = BrokerConfig::from_env();

    let output = match args.command {
        Commands::Providers => serde_json::to_value(commands::providers(&config))?,
        Commands::Normalize { provider, token } => {
            commands::normalize(&config, provider.as_deref(), &token)?
        }
        Commands::ResetMail { email } => commands::reset_mail(&config, &email)?,
        Commands::Demo {
            name,
            email,
            password,
        } => commands::demo(config, &name, &email, &password).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
