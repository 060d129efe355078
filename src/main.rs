mod cli;
mod config;
mod error;
mod insights;
mod model;
mod output;
mod providers;
mod simulator;
mod topology;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipeviz");
    cli.execute().await?;

    Ok(())
}
