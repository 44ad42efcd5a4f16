use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;
mod ui;

use cli::CliHandler;
use ui::UI;
use vaultcore::version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "vaultcore",
    about = "VaultCore API client",
    long_about = "VaultCore client - authenticated access to the VaultCore API

WORKFLOW:
  1. Open the login URL in a browser and sign in
  2. Exchange the authorization code from the callback for a session
  3. Call the API; expired access tokens are refreshed automatically

QUICK START:
  vaultcore login-url                   # Print the identity provider sign-in URL
  vaultcore login <CODE>                # Exchange the authorization code
  vaultcore request /api/wallet         # Call an endpoint
  vaultcore status                      # Show who is signed in
  vaultcore logout                      # End the session",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the identity provider sign-in URL
    LoginUrl,

    /// Print the identity provider registration URL
    RegisterUrl,

    /// Exchange an authorization code for a session
    Login(LoginArgs),

    /// End the session
    Logout,

    /// Show authentication status
    #[command(aliases = &["st"])]
    Status,

    /// Refresh the access token now
    Refresh,

    /// Call an API endpoint
    #[command(aliases = &["req"])]
    Request(RequestArgs),

    /// Inspect settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct LoginArgs {
    /// Authorization code from the identity provider callback
    pub code: String,
}

#[derive(Args)]
pub struct RequestArgs {
    /// Path on the API, e.g. /api/wallet
    pub endpoint: String,

    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request body; JSON is sent as is, `@path` reads the body from a file
    #[arg(short, long)]
    pub data: Option<String>,

    /// Extra header as `Name: value`
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vaultcore={}", log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut handler = CliHandler::with_config_path(cli.config);

    if let Err(e) = handler.execute(cli.command).await {
        UI::new().fail(&e.to_string());
        std::process::exit(1);
    }
}
