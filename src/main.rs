use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use deckhand::cli::{parse_args, run_cli_command};
use deckhand::config::DeckConfig;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // stdout carries JSON output, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = parse_args(std::env::args());
    run_cli_command(command, &DeckConfig::from_env()).await
}
