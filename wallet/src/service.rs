//! Account and trading use cases.
//!
//! Every public operation writes one action line to the `valuta::actions`
//! target with `result=OK` or `result=ERROR`.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};
use valuta_common::persist::{load_json, save_json};
use valuta_common::time::lenient_timestamp;
use valuta_common::{get_currency, Currency, Timestamp};
use valuta_rates::{RateService, ResolutionMethod};

use crate::error::{WalletError, WalletResult};
use crate::portfolio::Portfolio;
use crate::user::{validate_password, validate_username, User};

/// Tracing target of the per-operation action lines.
pub const ACTIONS_TARGET: &str = "valuta::actions";

/// Outcome of a buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeReceipt {
    pub currency: Currency,
    pub amount: Decimal,
    /// Price of one unit of `currency` in `base`.
    pub rate: Decimal,
    pub base: Currency,
    pub old_balance: Decimal,
    pub new_balance: Decimal,
    /// `amount * rate`.
    pub estimated_value: Decimal,
}

/// One wallet valued in the requested base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletValuation {
    pub currency: Currency,
    pub balance: Decimal,
    pub rate: Decimal,
    pub value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioView {
    pub username: String,
    pub base: Currency,
    pub wallets: Vec<WalletValuation>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateQuoteView {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub reverse_rate: Decimal,
    /// Observation time of the direct or inverse cache entry.
    #[serde(with = "lenient_timestamp")]
    pub updated_at: Option<Timestamp>,
}

/// Users, portfolios and trades on top of the rate service.
pub struct WalletService {
    users_path: PathBuf,
    portfolios_path: PathBuf,
    rates: Arc<RateService>,
}

impl WalletService {
    pub fn new(
        users_path: impl Into<PathBuf>,
        portfolios_path: impl Into<PathBuf>,
        rates: Arc<RateService>,
    ) -> Self {
        Self {
            users_path: users_path.into(),
            portfolios_path: portfolios_path.into(),
            rates,
        }
    }

    pub fn rates(&self) -> &Arc<RateService> {
        &self.rates
    }

    pub fn users_path(&self) -> &Path {
        &self.users_path
    }

    /// Register a user and create an empty portfolio. Returns the new id.
    pub async fn register(&self, username: &str, password: &str) -> WalletResult<u64> {
        let log = ActionLog::new("REGISTER", username.trim());
        let result = self.register_user(username, password);
        log.finish(&result);
        result
    }

    /// Check credentials and return the user id.
    pub async fn login(&self, username: &str, password: &str) -> WalletResult<u64> {
        let log = ActionLog::new("LOGIN", username.trim());
        let result = self.authenticate(username, password);
        log.finish(&result);
        result
    }

    /// Credit `amount` of `currency`, priced in the base currency.
    pub async fn buy(&self, user_id: u64, currency: &str, amount: Decimal) -> WalletResult<TradeReceipt> {
        let mut log = ActionLog::new("BUY", user_id);
        log.currency = Some(currency.trim().to_uppercase());
        log.amount = Some(amount);

        let result = self.trade(user_id, currency, amount, Side::Buy).await;
        log.record_receipt(&result);
        log.finish(&result);
        result
    }

    /// Debit `amount` of `currency`, priced in the base currency.
    pub async fn sell(&self, user_id: u64, currency: &str, amount: Decimal) -> WalletResult<TradeReceipt> {
        let mut log = ActionLog::new("SELL", user_id);
        log.currency = Some(currency.trim().to_uppercase());
        log.amount = Some(amount);

        let result = self.trade(user_id, currency, amount, Side::Sell).await;
        log.record_receipt(&result);
        log.finish(&result);
        result
    }

    /// Value every wallet in `base`, or in the engine base when `None`.
    #[instrument(skip(self))]
    pub async fn show_portfolio(&self, user_id: u64, base: Option<&str>) -> WalletResult<PortfolioView> {
        let users = self.load_users()?;
        let user = find_user(&users, user_id)?;

        let base = match base {
            Some(code) => get_currency(code)?.currency(),
            None => self.rates.base_currency().clone(),
        };

        let portfolios = self.load_portfolios()?;
        let portfolio = portfolios
            .iter()
            .find(|p| p.user_id == user_id)
            .ok_or(WalletError::PortfolioNotFound(user_id))?;

        let mut wallets = Vec::with_capacity(portfolio.wallets.len());
        let mut total = Decimal::ZERO;
        for wallet in portfolio.wallets.values() {
            let rate = self.rates.get_rate(&wallet.currency_code, &base).await?.rate;
            let value = value_in_base(wallet.balance, rate, &wallet.currency_code)?;
            total = total
                .checked_add(value)
                .ok_or_else(|| WalletError::Overflow(format!("portfolio total in {}", base)))?;
            wallets.push(WalletValuation {
                currency: wallet.currency_code.clone(),
                balance: wallet.balance,
                rate,
                value,
            });
        }

        Ok(PortfolioView {
            username: user.username.clone(),
            base,
            wallets,
            total,
        })
    }

    /// Rate between two supported currencies, both directions.
    #[instrument(skip(self))]
    pub async fn get_rate(&self, from: &str, to: &str) -> WalletResult<RateQuoteView> {
        let from = get_currency(from)?.currency();
        let to = get_currency(to)?.currency();

        let resolution = self.rates.get_rate(&from, &to).await?;
        let reverse_rate = if resolution.rate.is_zero() {
            Decimal::ZERO
        } else {
            Decimal::ONE / resolution.rate
        };
        let updated_at = match resolution.method {
            ResolutionMethod::Direct | ResolutionMethod::Inverse => resolution.updated_at,
            _ => None,
        };

        Ok(RateQuoteView {
            from,
            to,
            rate: resolution.rate,
            reverse_rate,
            updated_at,
        })
    }

    fn register_user(&self, username: &str, password: &str) -> WalletResult<u64> {
        let username = validate_username(username)?;
        validate_password(password)?;

        let mut users = self.load_users()?;
        if users.iter().any(|u| u.username == username) {
            return Err(WalletError::UsernameTaken(username));
        }

        let user_id = users.iter().map(|u| u.user_id).max().unwrap_or(0) + 1;
        users.push(User::new(user_id, &username, password)?);
        save_json(&self.users_path, &users)?;

        let mut portfolios = self.load_portfolios()?;
        if !portfolios.iter().any(|p| p.user_id == user_id) {
            portfolios.push(Portfolio::new(user_id));
            save_json(&self.portfolios_path, &portfolios)?;
        }

        Ok(user_id)
    }

    fn authenticate(&self, username: &str, password: &str) -> WalletResult<u64> {
        let username = username.trim();
        let users = self.load_users()?;
        let user = users
            .iter()
            .find(|u| u.username == username)
            .ok_or_else(|| WalletError::UserNotFound(username.to_string()))?;

        if !user.verify_password(password) {
            return Err(WalletError::InvalidPassword);
        }
        Ok(user.user_id)
    }

    async fn trade(&self, user_id: u64, currency: &str, amount: Decimal, side: Side) -> WalletResult<TradeReceipt> {
        find_user(&self.load_users()?, user_id)?;
        let code = get_currency(currency)?.currency();
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }

        let mut portfolios = self.load_portfolios()?;
        let portfolio = portfolios
            .iter_mut()
            .find(|p| p.user_id == user_id)
            .ok_or(WalletError::PortfolioNotFound(user_id))?;

        let (old_balance, new_balance) = match side {
            Side::Buy => {
                let wallet = portfolio.wallet_or_create(&code);
                let old = wallet.balance;
                wallet.deposit(amount)?;
                (old, wallet.balance)
            }
            Side::Sell => {
                let wallet = portfolio
                    .get_wallet_mut(&code)
                    .ok_or_else(|| WalletError::WalletNotFound(code.clone()))?;
                let old = wallet.balance;
                wallet.withdraw(amount)?;
                (old, wallet.balance)
            }
        };

        let base = self.rates.base_currency().clone();
        let rate = self.rates.get_rate(&code, &base).await?.rate;
        let estimated_value = value_in_base(amount, rate, &code)?;

        save_json(&self.portfolios_path, &portfolios)?;

        Ok(TradeReceipt {
            currency: code,
            amount,
            rate,
            base,
            old_balance,
            new_balance,
            estimated_value,
        })
    }

    fn load_users(&self) -> WalletResult<Vec<User>> {
        Ok(load_json(&self.users_path)?)
    }

    fn load_portfolios(&self) -> WalletResult<Vec<Portfolio>> {
        Ok(load_json(&self.portfolios_path)?)
    }
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Buy,
    Sell,
}

fn value_in_base(amount: Decimal, rate: Decimal, code: &Currency) -> WalletResult<Decimal> {
    amount
        .checked_mul(rate)
        .ok_or_else(|| WalletError::Overflow(format!("{} {} at rate {}", amount, code, rate)))
}

fn find_user(users: &[User], user_id: u64) -> WalletResult<&User> {
    users
        .iter()
        .find(|u| u.user_id == user_id)
        .ok_or(WalletError::UnknownUserId(user_id))
}

/// Fields of one action log line.
struct ActionLog {
    action: &'static str,
    user: String,
    currency: Option<String>,
    amount: Option<Decimal>,
    rate: Option<Decimal>,
    base: Option<Currency>,
}

impl ActionLog {
    fn new(action: &'static str, user: impl Display) -> Self {
        Self {
            action,
            user: user.to_string(),
            currency: None,
            amount: None,
            rate: None,
            base: None,
        }
    }

    fn record_receipt(&mut self, result: &WalletResult<TradeReceipt>) {
        if let Ok(receipt) = result {
            self.currency = Some(receipt.currency.to_string());
            self.rate = Some(receipt.rate);
            self.base = Some(receipt.base.clone());
        }
    }

    fn finish<T>(&self, result: &WalletResult<T>) {
        let currency = field(&self.currency);
        let amount = field(&self.amount);
        let rate = field(&self.rate);
        let base = field(&self.base);

        match result {
            Ok(_) => info!(
                target: ACTIONS_TARGET,
                action = self.action,
                user = %self.user,
                currency = %currency,
                amount = %amount,
                rate = %rate,
                base = %base,
                result = "OK"
            ),
            Err(e) => warn!(
                target: ACTIONS_TARGET,
                action = self.action,
                user = %self.user,
                currency = %currency,
                amount = %amount,
                rate = %rate,
                base = %base,
                result = "ERROR",
                error_code = e.error_code(),
                error = %e
            ),
        }
    }
}

fn field<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}
