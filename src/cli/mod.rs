//! CLI entry point for ghlogin.

pub mod auth;

use clap::{Parser, Subcommand};

/// GitHub OAuth login CLI
#[derive(Parser, Debug)]
#[command(name = "ghlogin", version, about = "Log in to GitHub through the OAuth web flow")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authorize in the browser and store an access token
    Login(LoginArgs),
    /// Show whether a token is stored
    Status,
    /// Remove the stored token
    Logout,
    /// Print the stored token
    Token,
}

/// Arguments for `ghlogin login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Print the authorization URL instead of opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Port for the local callback listener
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
