use anyhow::Result;
use clap::Parser;
use services::{AppServices, Clock};

mod commands;
mod config;
mod logging;

use config::{Cli, prepare_sqlite_dir};

async fn run(cli: Cli) -> Result<()> {
    let db_url = cli.database_url();
    // A failure here surfaces below as the in-memory fallback warning.
    if let Err(err) = prepare_sqlite_dir(&db_url) {
        tracing::warn!(error = %err, "could not prepare database directory");
    }

    let tree = cli.load_curriculum()?;
    let app = AppServices::open(&db_url, Clock::default_clock(), tree, cli.policy).await?;
    if let Some(warning) = app.storage_warning() {
        eprintln!("warning: {warning}");
    }

    commands::run(&app, cli.command).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }
}
