use crate::securities::symbols::{SecurityType, Symbol};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity a subscription is registered under in the feed's registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub symbol: Symbol,
    pub security_type: SecurityType,
}

impl SubscriptionKey {
    pub fn new(symbol: Symbol, security_type: SecurityType) -> SubscriptionKey {
        SubscriptionKey {
            symbol,
            security_type,
        }
    }
}

impl Display for SubscriptionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.security_type, self.symbol)
    }
}
