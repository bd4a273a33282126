//! Command line definition and dispatch.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::info;
use valuta_common::{get_currency, Currency};
use valuta_rates::ListingFilter;
use valuta_wallet::WalletService;

use crate::render;

/// ValutaTrade Hub CLI
#[derive(Parser, Debug)]
#[command(name = "valutatrade", version)]
#[command(about = "Multi-currency wallet with live exchange rates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Credentials checked on every authenticated command.
#[derive(Args, Debug, Clone)]
pub struct Credentials {
    #[arg(short, long)]
    pub username: String,

    #[arg(short, long)]
    pub password: String,
}

/// Rate sources selectable for a targeted refresh.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceArg {
    Coingecko,
    Exchangerate,
}

impl SourceArg {
    fn filter(self) -> &'static str {
        match self {
            SourceArg::Coingecko => "coingecko",
            SourceArg::Exchangerate => "exchangerate",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new user
    Register(Credentials),

    /// Check credentials
    Login(Credentials),

    /// Buy a currency
    Buy {
        #[command(flatten)]
        auth: Credentials,

        /// Currency code, e.g. BTC
        #[arg(short, long)]
        currency: String,

        #[arg(short, long)]
        amount: Decimal,
    },

    /// Sell a currency
    Sell {
        #[command(flatten)]
        auth: Credentials,

        #[arg(short, long)]
        currency: String,

        #[arg(short, long)]
        amount: Decimal,
    },

    /// Show wallets valued in a base currency
    ShowPortfolio {
        #[command(flatten)]
        auth: Credentials,

        /// Base currency (defaults to the engine base)
        #[arg(short, long)]
        base: Option<String>,
    },

    /// Show the rate between two currencies
    GetRate {
        #[arg(short, long)]
        from: String,

        #[arg(short, long)]
        to: String,
    },

    /// Fetch fresh rates from the sources
    UpdateRates {
        /// Refresh a single source
        #[arg(long, value_enum)]
        source: Option<SourceArg>,
    },

    /// List cached rates
    ShowRates {
        /// Only pairs quoting this currency
        #[arg(long)]
        currency: Option<String>,

        /// Keep the N highest rates
        #[arg(long)]
        top: Option<usize>,

        /// Express every cached currency in this base
        #[arg(long)]
        base: Option<String>,
    },

    /// Show recorded rate history
    History {
        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Refresh rates in the background until Ctrl+C
    Schedule {
        /// Seconds between refreshes
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Run a command and return its stdout text.
pub async fn execute(command: Command, wallet: &WalletService) -> anyhow::Result<String> {
    let output = match command {
        Command::Register(auth) => {
            let user_id = wallet.register(&auth.username, &auth.password).await?;
            format!(
                "User '{}' registered (id={}). Log in with: login --username {} --password ****",
                auth.username.trim(),
                user_id,
                auth.username.trim()
            )
        }

        Command::Login(auth) => {
            wallet.login(&auth.username, &auth.password).await?;
            format!("Logged in as '{}'", auth.username.trim())
        }

        Command::Buy { auth, currency, amount } => {
            let user_id = wallet.login(&auth.username, &auth.password).await?;
            let receipt = wallet.buy(user_id, &currency, amount).await?;
            render::trade("Purchase", &receipt)
        }

        Command::Sell { auth, currency, amount } => {
            let user_id = wallet.login(&auth.username, &auth.password).await?;
            let receipt = wallet.sell(user_id, &currency, amount).await?;
            render::trade("Sale", &receipt)
        }

        Command::ShowPortfolio { auth, base } => {
            let user_id = wallet.login(&auth.username, &auth.password).await?;
            let view = wallet.show_portfolio(user_id, base.as_deref()).await?;
            render::portfolio(&view)
        }

        Command::GetRate { from, to } => {
            let view = wallet.get_rate(&from, &to).await?;
            render::quote(&view)
        }

        Command::UpdateRates { source } => {
            let result = wallet
                .rates()
                .refresh_from(source.map(SourceArg::filter))
                .await?;
            render::update(&result)
        }

        Command::ShowRates { currency, top, base } => {
            let filter = ListingFilter {
                currency: currency.as_deref().map(Currency::parse).transpose()?,
                base: base.as_deref().map(supported).transpose()?,
                top,
            };
            let listing = wallet.rates().cached_rates(&filter)?;
            render::listing(&listing)
        }

        Command::History { from, to, limit } => {
            let from = from.as_deref().map(Currency::parse).transpose()?;
            let to = to.as_deref().map(Currency::parse).transpose()?;
            let records = wallet.rates().history(from.as_ref(), to.as_ref(), limit);
            render::history(&records)
        }

        Command::Schedule { interval } => {
            schedule(wallet, interval).await?;
            "Scheduler stopped".to_string()
        }
    };

    Ok(output)
}

fn supported(code: &str) -> Result<Currency, valuta_common::CommonError> {
    get_currency(code).map(|info| info.currency())
}

async fn schedule(wallet: &WalletService, interval: Option<u64>) -> anyhow::Result<()> {
    let scheduler = wallet.rates().scheduler();
    if let Some(secs) = interval {
        scheduler.set_interval(Duration::from_secs(secs));
    }

    scheduler.start();
    info!(interval_secs = scheduler.interval().as_secs(), "Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;
    use rust_decimal_macros::dec;
    use valuta_rates::source::MockRateSource;
    use valuta_rates::{RateService, RateSource};

    use crate::config::AppConfig;

    fn wallet(dir: &TempDir) -> WalletService {
        let config = AppConfig::default().with_data_dir(dir.path());
        let source: Arc<dyn RateSource> = Arc::new(
            MockRateSource::new("CoinGecko")
                .with_rate("BTC_USD", dec!(59000))
                .with_rate("EUR_USD", dec!(1.08)),
        );
        let rates = Arc::new(RateService::new(config.rates.clone(), vec![source]).unwrap());
        WalletService::new(config.users_path(), config.portfolios_path(), rates)
    }

    fn parse(args: &[&str]) -> Command {
        let mut argv = vec!["valutatrade"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(
            parse(&["buy", "-u", "alice", "-p", "pass1234", "-c", "BTC", "-a", "0.05"]),
            Command::Buy { amount, .. } if amount == dec!(0.05)
        ));
        assert!(matches!(
            parse(&["update-rates", "--source", "coingecko"]),
            Command::UpdateRates { source: Some(SourceArg::Coingecko) }
        ));
        assert!(matches!(
            parse(&["show-rates", "--top", "2"]),
            Command::ShowRates { top: Some(2), .. }
        ));
        assert!(Cli::try_parse_from(["valutatrade", "buy", "-u", "alice"]).is_err());
        assert!(Cli::try_parse_from(["valutatrade", "update-rates", "--source", "bloomberg"]).is_err());
    }

    #[tokio::test]
    async fn test_session_flow() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);

        let out = execute(parse(&["register", "-u", "alice", "-p", "pass1234"]), &wallet).await.unwrap();
        assert!(out.contains("registered (id=1)"));

        let out = execute(parse(&["buy", "-u", "alice", "-p", "pass1234", "-c", "btc", "-a", "0.05"]), &wallet)
            .await
            .unwrap();
        assert!(out.contains("Estimated value: 2950.00 USD"));

        let out = execute(parse(&["show-portfolio", "-u", "alice", "-p", "pass1234"]), &wallet)
            .await
            .unwrap();
        assert!(out.contains("TOTAL: 2950.00 USD"));

        let err = execute(parse(&["sell", "-u", "alice", "-p", "wrong", "-c", "BTC", "-a", "1"]), &wallet)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid password");
    }

    #[tokio::test]
    async fn test_rate_commands() {
        let dir = TempDir::new().unwrap();
        let wallet = wallet(&dir);

        let out = execute(parse(&["show-rates"]), &wallet).await.unwrap();
        assert!(out.contains("cache is empty"));

        let out = execute(parse(&["update-rates"]), &wallet).await.unwrap();
        assert!(out.contains("Total rates updated: 2"));

        let out = execute(parse(&["show-rates", "--currency", "BTC"]), &wallet).await.unwrap();
        assert!(out.contains("- BTC_USD: 59000"));
        assert!(!out.contains("EUR_USD"));

        let out = execute(parse(&["get-rate", "-f", "EUR", "-t", "USD"]), &wallet).await.unwrap();
        assert!(out.starts_with("Rate EUR->USD: 1.08"));

        let out = execute(parse(&["history", "--from", "BTC"]), &wallet).await.unwrap();
        assert!(out.contains("BTC_USD  59000  (ParserService)"));

        let err = execute(parse(&["update-rates", "--source", "exchangerate"]), &wallet)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unknown rate source"));
    }
}
