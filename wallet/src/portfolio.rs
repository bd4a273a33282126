//! Per-user wallets and balances.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use valuta_common::Currency;

use crate::error::{WalletError, WalletResult};

/// Balance held in one currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub currency_code: Currency,
    pub balance: Decimal,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(currency_code: Currency) -> Self {
        Self {
            currency_code,
            balance: Decimal::ZERO,
        }
    }

    /// Add a positive amount.
    pub fn deposit(&mut self, amount: Decimal) -> WalletResult<()> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            WalletError::Overflow(format!("{} {} + {}", self.balance, self.currency_code, amount))
        })?;
        Ok(())
    }

    /// Remove a positive amount not exceeding the balance.
    pub fn withdraw(&mut self, amount: Decimal) -> WalletResult<()> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(WalletError::InsufficientFunds {
                available: self.balance,
                required: amount,
                code: self.currency_code.clone(),
            });
        }
        self.balance -= amount;
        Ok(())
    }
}

/// All wallets of one user, keyed by currency code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub user_id: u64,
    #[serde(default)]
    pub wallets: BTreeMap<String, Wallet>,
}

impl Portfolio {
    /// Create an empty portfolio.
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            wallets: BTreeMap::new(),
        }
    }

    pub fn get_wallet(&self, code: &Currency) -> Option<&Wallet> {
        self.wallets.get(code.code())
    }

    pub fn get_wallet_mut(&mut self, code: &Currency) -> Option<&mut Wallet> {
        self.wallets.get_mut(code.code())
    }

    /// Get the wallet for `code`, creating an empty one if needed.
    pub fn wallet_or_create(&mut self, code: &Currency) -> &mut Wallet {
        self.wallets
            .entry(code.code().to_string())
            .or_insert_with(|| Wallet::new(code.clone()))
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_deposit_and_withdraw() {
        let mut wallet = Wallet::new(Currency::btc());

        wallet.deposit(dec!(0.5)).unwrap();
        wallet.withdraw(dec!(0.2)).unwrap();

        assert_eq!(wallet.balance, dec!(0.3));
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let mut wallet = Wallet::new(Currency::usd());

        assert!(matches!(wallet.deposit(dec!(0)), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(wallet.withdraw(dec!(-1)), Err(WalletError::InvalidAmount(_))));
        assert_eq!(wallet.balance, Decimal::ZERO);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut wallet = Wallet::new(Currency::btc());
        wallet.deposit(dec!(0.1)).unwrap();

        let err = wallet.withdraw(dec!(0.2)).unwrap_err();

        match err {
            WalletError::InsufficientFunds { available, required, code } => {
                assert_eq!(available, dec!(0.1));
                assert_eq!(required, dec!(0.2));
                assert_eq!(code, Currency::btc());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wallet.balance, dec!(0.1));
    }

    #[test]
    fn test_deposit_overflow_keeps_balance() {
        let mut wallet = Wallet::new(Currency::usd());
        wallet.deposit(Decimal::MAX).unwrap();

        assert!(matches!(wallet.deposit(dec!(1)), Err(WalletError::Overflow(_))));
        assert_eq!(wallet.balance, Decimal::MAX);
    }

    #[test]
    fn test_wallet_or_create() {
        let mut portfolio = Portfolio::new(1);
        assert!(portfolio.is_empty());

        portfolio.wallet_or_create(&Currency::eur()).deposit(dec!(10)).unwrap();
        portfolio.wallet_or_create(&Currency::eur()).deposit(dec!(5)).unwrap();

        assert_eq!(portfolio.wallets.len(), 1);
        assert_eq!(portfolio.get_wallet(&Currency::eur()).unwrap().balance, dec!(15));
    }

    #[test]
    fn test_file_shape() {
        let mut portfolio = Portfolio::new(3);
        portfolio.wallet_or_create(&Currency::usd()).deposit(dec!(100)).unwrap();

        let json = serde_json::to_value(&portfolio).unwrap();

        assert_eq!(json["user_id"], 3);
        assert_eq!(json["wallets"]["USD"]["currency_code"], "USD");
        assert_eq!(json["wallets"]["USD"]["balance"], serde_json::json!(100.0));
    }
}
