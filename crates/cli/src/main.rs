//! shellcache command-line entry point.
//!
//! Drives the offline cache controller against the configured origin and
//! cache storage. Logging goes to stderr so stdout stays parseable.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "shellcache")]
#[command(about = "Offline app shell cache for the clinic video recorder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install and activate a controller version, seeding the app shell
    Install {
        /// Version tag (default: configured or derived from the manifest)
        #[arg(long)]
        tag: Option<String>,
    },

    /// Route one request through the active controller and print the answer
    Fetch {
        /// Path or absolute URL to request
        target: String,

        /// Treat the request as a top-level navigation
        #[arg(long)]
        navigate: bool,

        /// Request destination (script, style, image, font, video, ...)
        #[arg(long)]
        destination: Option<String>,

        /// Byte range, e.g. "bytes=1000-2000"
        #[arg(long)]
        range: Option<String>,

        /// HTTP method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Write the response body to stdout
        #[arg(long)]
        body: bool,
    },

    /// List cache generations and their entry counts
    Generations,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    let config = shellcache_core::AppConfig::load()?;
    tracing::debug!(origin = %config.origin, db = %config.db_path.display(), "configuration loaded");

    match cli.command {
        Command::Install { tag } => commands::install(&config, tag).await,
        Command::Fetch { target, navigate, destination, range, method, body } => {
            let options = commands::FetchOptions { target, navigate, destination, range, method, body };
            commands::fetch(&config, options).await
        }
        Command::Generations => commands::generations(&config).await,
    }
}
