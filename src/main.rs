mod auth;
mod checkpoint;
mod cli;
mod collector;
mod config;
mod error;
mod output;
mod providers;
mod records;
mod storage;
mod usage;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting actionboard - GitHub Actions Usage Collector");
    cli.execute().await?;

    Ok(())
}
