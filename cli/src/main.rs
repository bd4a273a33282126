//! ValutaTrade Hub Binary

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error};

use valuta_cli::{execute, logging, render, AppConfig, Cli};
use valuta_rates::RateService;
use valuta_wallet::WalletService;

#[tokio::main]
async fn main() -> ExitCode {
    AppConfig::load_env_file(None);

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let _log_guard = match logging::init(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Error: configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli, config).await {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", render::error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<String> {
    debug!(data_dir = %config.data_dir.display(), "Opening data files");

    let rates = Arc::new(RateService::from_config(config.rates.clone())?);
    let wallet = WalletService::new(config.users_path(), config.portfolios_path(), rates);

    execute(cli.command, &wallet).await
}
