use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Hearth community client: session tokens and cache tooling")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file (defaults to ./hearth.toml)
    #[arg(short, long, global = true, env = "HEARTH_CONFIG")]
    pub config: Option<String>,

    /// Session profile name
    #[arg(short, long, global = true, env = "HEARTH_PROFILE", default_value = "default")]
    pub profile: String,

    /// Log level (overrides logging.level from the config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a token pair for the profile
    Login(LoginArgs),
    /// Decode an access token (defaults to the stored one)
    Decode(DecodeArgs),
    /// Show the stored session
    Status,
    /// Renew the stored token pair now
    Refresh,
    /// Log out and remove the stored session
    Logout,
    /// Keep the stored session renewed until Ctrl-C
    Watch,
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Access token (JWT)
    #[arg(long, env = "HEARTH_ACCESS_TOKEN")]
    pub access_token: String,
    /// Refresh token
    #[arg(long, env = "HEARTH_REFRESH_TOKEN")]
    pub refresh_token: String,
}

#[derive(clap::Args)]
pub struct DecodeArgs {
    /// Token to decode
    pub token: Option<String>,
}
