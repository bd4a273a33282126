//! Text rendering for command output and errors.

use std::fmt::Write;

use rust_decimal::Decimal;
use valuta_common::time::format_iso;
use valuta_common::{supported_codes, CommonError, Timestamp};
use valuta_rates::{HistoryRecord, RateError, RateListing, UpdateResult};
use valuta_wallet::{PortfolioView, RateQuoteView, TradeReceipt, WalletError};

/// Rate with up to 8 decimals and no trailing zeros.
pub fn rate(value: Decimal) -> String {
    value.round_dp(8).normalize().to_string()
}

/// Amount with 4 decimals.
pub fn amount(value: Decimal) -> String {
    format!("{:.4}", value)
}

/// Value in a base currency with 2 decimals.
pub fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn timestamp(value: Option<Timestamp>) -> String {
    value.map_or_else(|| "unknown".to_string(), |ts| format_iso(&ts))
}

pub fn trade(verb: &str, receipt: &TradeReceipt) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} complete: {} {} at rate {} {}/{}",
        verb,
        amount(receipt.amount),
        receipt.currency,
        rate(receipt.rate),
        receipt.base,
        receipt.currency
    );
    let _ = writeln!(out, "Changes in portfolio:");
    let _ = writeln!(
        out,
        "- {}: was {} -> now {}",
        receipt.currency,
        amount(receipt.old_balance),
        amount(receipt.new_balance)
    );
    let _ = write!(
        out,
        "Estimated value: {} {}",
        money(receipt.estimated_value),
        receipt.base
    );
    out
}

pub fn portfolio(view: &PortfolioView) -> String {
    if view.wallets.is_empty() {
        return format!("Portfolio of '{}' is empty", view.username);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Portfolio of '{}' (base: {}):", view.username, view.base);
    for wallet in &view.wallets {
        let _ = writeln!(
            out,
            "- {}: {}  -> {} {}",
            wallet.currency,
            amount(wallet.balance),
            money(wallet.value),
            view.base
        );
    }
    let _ = writeln!(out, "---------------------------------");
    let _ = write!(out, "TOTAL: {} {}", money(view.total), view.base);
    out
}

pub fn quote(view: &RateQuoteView) -> String {
    format!(
        "Rate {}->{}: {} (updated: {})\nReverse rate {}->{}: {}",
        view.from,
        view.to,
        rate(view.rate),
        timestamp(view.updated_at),
        view.to,
        view.from,
        rate(view.reverse_rate)
    )
}

pub fn update(result: &UpdateResult) -> String {
    let mut out = format!(
        "Update successful. Total rates updated: {}. Last refresh: {}",
        result.total_rates,
        format_iso(&result.timestamp)
    );
    if !result.failed_sources.is_empty() {
        let _ = write!(
            out,
            "\nCompleted with errors from: {}. Check logs for details.",
            result.failed_sources.join(", ")
        );
    }
    out
}

pub fn listing(listing: &RateListing) -> String {
    if listing.rows.is_empty() {
        return "Local rates cache is empty or nothing matched. Run 'update-rates' to load data.".to_string();
    }

    let mut out = format!("Rates from cache (updated at {}):", timestamp(listing.last_refresh));
    for row in &listing.rows {
        let _ = write!(out, "\n- {}: {}", row.pair, rate(row.rate));
    }
    out
}

pub fn history(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "No history records found".to_string();
    }

    records
        .iter()
        .map(|r| {
            format!(
                "{}  {}_{}  {}  ({})",
                format_iso(&r.timestamp),
                r.from_currency,
                r.to_currency,
                rate(r.rate),
                r.source
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User facing error text, with hints for known failure kinds.
pub fn error(err: &anyhow::Error) -> String {
    let mut out = format!("Error: {}", err);

    let rate_error = err
        .downcast_ref::<RateError>()
        .or_else(|| match err.downcast_ref::<WalletError>() {
            Some(WalletError::Rates(e)) => Some(e),
            _ => None,
        });

    let currency_error = match err.downcast_ref::<WalletError>() {
        Some(e) => e.is_currency_error(),
        None => matches!(
            err.downcast_ref::<CommonError>(),
            Some(CommonError::CurrencyNotFound(_)) | Some(CommonError::InvalidCurrencyCode(_))
        ),
    };

    if currency_error {
        let _ = write!(out, "\nSupported currencies: {}", supported_codes().join(", "));
    }

    match rate_error {
        Some(RateError::Fetch(_)) | Some(RateError::NoRatesAvailable { .. }) => {
            out.push_str("\nRate sources are unavailable. Please try again later.");
        }
        Some(RateError::RateNotFound(_)) => {
            out.push_str("\nRun 'update-rates' to refresh the cache, or check the currency codes.");
        }
        _ => {}
    }

    out
}
