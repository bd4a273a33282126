//! ValutaTrade Wallet
//!
//! User registration and login, per-user multi-currency portfolios, and the
//! buy/sell/valuation use cases priced through the rate engine.

pub mod error;
pub mod password;
pub mod portfolio;
pub mod service;
pub mod user;

pub use error::{WalletError, WalletResult};
pub use portfolio::{Portfolio, Wallet};
pub use service::{PortfolioView, RateQuoteView, TradeReceipt, WalletService, WalletValuation, ACTIONS_TARGET};
pub use user::User;
