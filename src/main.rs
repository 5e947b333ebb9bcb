//! Sibyl CLI entry point.

use clap::Parser;

use sibyl::cli::{init_logging, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config must load before the subscriber so logging.level and
    // logging.format take effect.
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);

    if let Err(err) = cli.execute(config).await {
        tracing::error!("{err:#}");
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
