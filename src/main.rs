//! ghlogin CLI binary entry point.

use ghlogin::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Login(args) => ghlogin::cli::auth::handle_login(args).await,
        Commands::Status => ghlogin::cli::auth::handle_status().await,
        Commands::Logout => ghlogin::cli::auth::handle_logout().await,
        Commands::Token => ghlogin::cli::auth::handle_token().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
