use crate::algorithm::Universe;
use crate::subscriptions::DataEnumerator;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tf_types::base_data::BaseData;
use tf_types::config::SubscriptionConfig;
use tf_types::securities::security::Security;

/// Latest traded price for a symbol, shared between the exchange handler
/// (writer, dispatcher task) and anyone inspecting the subscription. Makes
/// the newest price observable without waiting for a bar close.
#[derive(Clone, Default)]
pub struct SharedPrice(Arc<Mutex<Decimal>>);

impl SharedPrice {
    pub fn new() -> SharedPrice {
        SharedPrice::default()
    }

    pub fn set(&self, price: Decimal) {
        *self.0.lock().expect("price lock poisoned") = price;
    }

    pub fn get(&self) -> Decimal {
        *self.0.lock().expect("price lock poisoned")
    }
}

/// Per-symbol feed state. Owned by the frontier loop; the dispatcher only
/// touches the shared cells wired into its exchange handler (the enqueue
/// handle / aggregator cell and the realtime price).
pub struct Subscription {
    pub config: SubscriptionConfig,
    pub security: Security,
    source: Box<dyn DataEnumerator>,
    pub current: Option<BaseData>,
    /// False when `current` holds an item saved for a later frontier.
    pub needs_advance: bool,
    pub utc_start: DateTime<Utc>,
    pub utc_end: DateTime<Utc>,
    pub is_user_defined: bool,
    pub is_universe_selection: bool,
    pub universe: Option<Arc<Universe>>,
    realtime_price: SharedPrice,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        security: Security,
        source: Box<dyn DataEnumerator>,
        realtime_price: SharedPrice,
        utc_start: DateTime<Utc>,
        utc_end: DateTime<Utc>,
        is_user_defined: bool,
        universe: Option<Arc<Universe>>,
    ) -> Subscription {
        let mut sub = Subscription {
            config: security.config.clone(),
            security,
            source,
            current: None,
            needs_advance: true,
            utc_start,
            utc_end,
            is_user_defined,
            is_universe_selection: universe.is_some(),
            universe,
            realtime_price,
        };
        // Prime with one advance so the frontier sees an accurate state.
        sub.advance();
        sub.needs_advance = sub.current.is_none();
        sub
    }

    /// Pull the source once and latch its item. Returns false only for a
    /// terminated sequence.
    pub fn advance(&mut self) -> bool {
        let alive = self.source.advance();
        self.current = self.source.current().cloned();
        alive
    }

    pub fn realtime_price(&self) -> Decimal {
        self.realtime_price.get()
    }
}
