//! ValutaTrade Common Types
//!
//! Shared building blocks for the rate engine and the wallet: currency codes and
//! the supported-currency registry, directed currency pairs, UTC timestamps, and
//! atomic JSON file persistence.

pub mod monetary;
pub mod registry;
pub mod error;
pub mod time;
pub mod persist;

pub use monetary::*;
pub use registry::{get_currency, supported_codes, CurrencyInfo, CurrencyKind};
pub use error::*;
pub use time::*;
