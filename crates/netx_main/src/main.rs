use anyhow::Result;
use clap::Parser;
use netx_main::{AppConfig, Cli, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials may live in a .env file next to the config.
    dotenvy::dotenv().ok();

    let config = AppConfig::load(&cli.config)?;
    let _guard = logging::init(&config.log_file, cli.verbose)?;

    netx_main::run(cli, config).await
}
