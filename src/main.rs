use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::Result;
use clap::Parser;
use pump_lifecycle_bot::{
    common::{
        config::{Cli, Config},
        constants::RUN_MSG,
        logger::Logger,
    },
    run_lifecycle_bot,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(&cli.log_file) {
        eprintln!(
            "cannot open log file {}: {}, logging to console only",
            cli.log_file.display(),
            e
        );
    }
    let logger = Logger::new("[MAIN] => ");

    /* Initial Settings */
    let config = match Config::new(&cli).await {
        Ok(config) => config,
        Err(e) => {
            logger.error(format!("Startup aborted: {:#}", e));
            std::process::exit(1);
        }
    };

    /* Running Bot */
    println!("{}", RUN_MSG);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            Logger::new("[MAIN] => ").warn("Ctrl-C received, shutting down".to_string());
            shutdown.cancel();
        }
    });

    if let Err(e) = run_lifecycle_bot(config, cancel).await {
        logger.error(format!("Bot stopped: {:#}", e));
        std::process::exit(1);
    }
}
