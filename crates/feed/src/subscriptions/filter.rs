use crate::subscriptions::DataEnumerator;
use chrono::{DateTime, Utc};
use tf_types::base_data::BaseData;
use tf_types::securities::symbols::Symbol;

/// Final stage of every per-symbol pipeline: drops items past the
/// subscription end and, defensively, items carrying a foreign symbol.
pub struct SubscriptionFilterEnumerator {
    inner: Box<dyn DataEnumerator>,
    symbol: Symbol,
    end_utc: DateTime<Utc>,
    current: Option<BaseData>,
}

impl SubscriptionFilterEnumerator {
    pub fn new(
        inner: Box<dyn DataEnumerator>,
        symbol: Symbol,
        end_utc: DateTime<Utc>,
    ) -> SubscriptionFilterEnumerator {
        SubscriptionFilterEnumerator {
            inner,
            symbol,
            end_utc,
            current: None,
        }
    }
}

impl DataEnumerator for SubscriptionFilterEnumerator {
    fn advance(&mut self) -> bool {
        let alive = self.inner.advance();
        self.current = self
            .inner
            .current()
            .filter(|item| item.symbol() == &self.symbol && item.end_time() <= self.end_utc)
            .cloned();
        alive
    }

    fn current(&self) -> Option<&BaseData> {
        self.current.as_ref()
    }
}
