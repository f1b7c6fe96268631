use crate::config::SubscriptionConfig;
use crate::securities::hours::{MarketHours, hours_for_venue};
use crate::securities::symbols::{SecurityType, Symbol, Venue};

/// A tradeable instrument: symbol, asset class, listing venue and the
/// subscription settings the feed should use for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Security {
    pub symbol: Symbol,
    pub security_type: SecurityType,
    pub venue: Venue,
    pub config: SubscriptionConfig,
}

impl Security {
    /// Security on the default venue for its asset class, with default
    /// subscription settings for the given resolution.
    pub fn new(
        symbol: Symbol,
        security_type: SecurityType,
        resolution: crate::base_data::Resolution,
    ) -> Security {
        let venue = Venue::default_for(security_type);
        let config = SubscriptionConfig::new(symbol.clone(), security_type, venue, resolution);
        Security {
            symbol,
            security_type,
            venue,
            config,
        }
    }

    pub fn with_config(mut self, config: SubscriptionConfig) -> Security {
        debug_assert_eq!(config.symbol, self.symbol);
        self.config = config;
        self
    }

    pub fn market_hours(&self) -> MarketHours {
        hours_for_venue(self.venue)
    }
}
