use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    AUD,
    CHF,
    CAD,
}

/// Snapshot of the algorithm's cash balances, frozen into each time slice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashBook {
    pub account_currency: Currency,
    balances: BTreeMap<Currency, Decimal>,
}

impl CashBook {
    pub fn new(account_currency: Currency) -> CashBook {
        CashBook {
            account_currency,
            balances: BTreeMap::new(),
        }
    }

    pub fn set_cash(&mut self, currency: Currency, amount: Decimal) {
        self.balances.insert(currency, amount);
    }

    pub fn cash(&self, currency: Currency) -> Decimal {
        self.balances.get(&currency).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Currency, &Decimal)> {
        self.balances.iter()
    }
}
