mod cli;
mod commands;
mod output;
mod session_file;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use hearth_client::config::loader::load_config;
use hearth_client::observability::init_tracing_with_level;
use hearth_client::ClientContext;
use output::print_error;
use session_file::SessionFile;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())
        .map_err(anyhow::Error::msg)
        .context("Failed to load configuration")?;
    init_tracing_with_level(cli.log_level.as_deref().unwrap_or(&config.logging.level));

    let file = SessionFile::for_profile(&cli.profile)?;

    match &cli.command {
        Commands::Login(args) => commands::session::login(args, &file)?,
        Commands::Decode(args) => commands::session::decode(args, &file)?,
        Commands::Status => {
            let ctx = ClientContext::connect(config)?;
            commands::session::status(&ctx, &file)?;
        }
        Commands::Refresh => {
            let ctx = ClientContext::connect(config)?;
            commands::session::refresh(&ctx, &file).await?;
        }
        Commands::Logout => {
            let ctx = ClientContext::connect(config)?;
            commands::session::logout(&ctx, &file).await?;
        }
        Commands::Watch => {
            let ctx = ClientContext::connect(config)?;
            commands::session::watch(&ctx, &file).await?;
        }
    }

    Ok(())
}
