//! Registry of currencies the wallet accepts.

use crate::error::CommonError;
use crate::monetary::Currency;

/// Kind-specific details for a registered currency.
#[derive(Debug, Clone, PartialEq)]
pub enum CurrencyKind {
    Fiat { issuing_country: &'static str },
    Crypto { algorithm: &'static str, market_cap: f64 },
}

/// A supported currency with its display metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrencyInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: CurrencyKind,
}

impl CurrencyInfo {
    /// The validated currency code.
    pub fn currency(&self) -> Currency {
        Currency::new(self.code)
    }

    pub fn is_crypto(&self) -> bool {
        matches!(self.kind, CurrencyKind::Crypto { .. })
    }

    /// One-line description, e.g. `[FIAT] USD — US Dollar (Issuing: United States)`.
    pub fn display_info(&self) -> String {
        match &self.kind {
            CurrencyKind::Fiat { issuing_country } => {
                format!("[FIAT] {} — {} (Issuing: {})", self.code, self.name, issuing_country)
            }
            CurrencyKind::Crypto {
                algorithm,
                market_cap,
            } => format!(
                "[CRYPTO] {} — {} (Algo: {}, MCAP: {:.2e})",
                self.code, self.name, algorithm, market_cap
            ),
        }
    }
}

static REGISTRY: &[CurrencyInfo] = &[
    CurrencyInfo {
        code: "USD",
        name: "US Dollar",
        kind: CurrencyKind::Fiat { issuing_country: "United States" },
    },
    CurrencyInfo {
        code: "EUR",
        name: "Euro",
        kind: CurrencyKind::Fiat { issuing_country: "Eurozone" },
    },
    CurrencyInfo {
        code: "GBP",
        name: "British Pound",
        kind: CurrencyKind::Fiat { issuing_country: "United Kingdom" },
    },
    CurrencyInfo {
        code: "RUB",
        name: "Russian Ruble",
        kind: CurrencyKind::Fiat { issuing_country: "Russia" },
    },
    CurrencyInfo {
        code: "JPY",
        name: "Japanese Yen",
        kind: CurrencyKind::Fiat { issuing_country: "Japan" },
    },
    CurrencyInfo {
        code: "CNY",
        name: "Chinese Yuan",
        kind: CurrencyKind::Fiat { issuing_country: "China" },
    },
    CurrencyInfo {
        code: "BTC",
        name: "Bitcoin",
        kind: CurrencyKind::Crypto { algorithm: "SHA-256", market_cap: 1.12e12 },
    },
    CurrencyInfo {
        code: "ETH",
        name: "Ethereum",
        kind: CurrencyKind::Crypto { algorithm: "Ethash", market_cap: 4.5e11 },
    },
    CurrencyInfo {
        code: "SOL",
        name: "Solana",
        kind: CurrencyKind::Crypto { algorithm: "Proof of History", market_cap: 7.8e10 },
    },
];

/// Look up a currency by user supplied code.
pub fn get_currency(code: &str) -> Result<&'static CurrencyInfo, CommonError> {
    let currency = Currency::parse(code)?;
    REGISTRY
        .iter()
        .find(|info| info.code == currency.code())
        .ok_or_else(|| CommonError::CurrencyNotFound(currency.code().to_string()))
}

/// All supported codes in registry order.
pub fn supported_codes() -> Vec<&'static str> {
    REGISTRY.iter().map(|info| info.code).collect()
}
