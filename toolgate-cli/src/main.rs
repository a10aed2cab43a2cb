//! Command-line entry point for the Toolgate registry server.

use anyhow::Context;
use clap::{Parser, Subcommand};
use toolgate::Mode;
use toolgate_server::{run, ServerOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "toolgate", version, about = "MCP aggregating proxy and registry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the registry server
    Start {
        /// Port to bind to (overrides $PORT, defaults to 8080)
        #[arg(long)]
        port: Option<u16>,

        /// Start in production mode (overrides $SERVER_MODE)
        #[arg(long)]
        prod: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Start { port, prod } => {
            let opts = ServerOptions {
                port: resolve_port(port)?,
                database_url: non_empty_env("DATABASE_URL"),
                desired_mode: resolve_mode(prod)?,
            };
            run(opts).await
        }
    }
}

fn resolve_port(flag: Option<u16>) -> anyhow::Result<u16> {
    if let Some(port) = flag {
        return Ok(port);
    }
    match non_empty_env("PORT") {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid PORT value '{value}'")),
        None => Ok(8080),
    }
}

fn resolve_mode(prod_flag: bool) -> anyhow::Result<Mode> {
    if prod_flag {
        return Ok(Mode::Prod);
    }
    match non_empty_env("SERVER_MODE") {
        Some(value) => Ok(value.parse::<Mode>()?),
        None => Ok(Mode::Dev),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
