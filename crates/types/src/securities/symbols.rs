use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use strum_macros::Display;

/// Opaque instrument identifier used as the routing key throughout the feed.
/// Canonical form is upper-case (`SPY`, `EURUSD`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Symbol {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Symbol::new(s))
    }
}

/// Asset class of a subscribed instrument. Paired with [`Symbol`] it forms
/// the identity a subscription is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum SecurityType {
    Equity,
    Forex,
    /// Custom or user-defined data with no listed venue.
    Base,
}

/// Listing venue. Drives the trading calendar and the default config zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, PartialOrd, Ord)]
pub enum Venue {
    NYSE,
    NASDAQ,
    FXCM,
    /// Simulated always-open venue for custom data.
    SIM,
}

impl Venue {
    #[inline]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NYSE" => Some(Venue::NYSE),
            "NASDAQ" => Some(Venue::NASDAQ),
            "FXCM" => Some(Venue::FXCM),
            "SIM" => Some(Venue::SIM),
            _ => None,
        }
    }

    /// Default venue for an asset class when the caller does not name one.
    pub fn default_for(security_type: SecurityType) -> Venue {
        match security_type {
            SecurityType::Equity => Venue::NYSE,
            SecurityType::Forex => Venue::FXCM,
            SecurityType::Base => Venue::SIM,
        }
    }
}
