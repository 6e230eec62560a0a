use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use message_selector::{run_selector, Config};

#[derive(Parser, Debug)]
#[command(
    name = "message-selector",
    about = "Selects unique file notifications (based on uid) from multiple sources"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the selector with the given yaml config file
    Run {
        /// The yaml config file
        config: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "message_selector=debug"
    } else {
        "message_selector=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Run { config } => {
            let config = Config::from_file(&config)?;

            let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received");
                    let _ = shutdown_tx.send(()).await;
                }
            });

            if let Err(e) = run_selector(&config, shutdown_rx)
                .await
                .context("selector terminated")
            {
                error!("{e:#}");
                return Err(e);
            }
            Ok(())
        }
    }
}
