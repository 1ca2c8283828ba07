use anyhow::Result;
use clap::Parser;
use cistatus::cli::Cli;
use cistatus::output;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting cistatus - CI pipeline status aggregation");
    cli.execute().await?;

    Ok(())
}
