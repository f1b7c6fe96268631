use crate::clock::TimeProvider;
use crate::subscriptions::DataEnumerator;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tf_types::base_data::{BaseData, Resolution};
use tf_types::cash::CashBook;
use tf_types::config::{DataKind, SubscriptionConfig};
use tf_types::securities::security::Security;
use tf_types::securities::symbols::{SecurityType, Symbol, Venue};

/// A universe-selection stream: the feed routes bulk selection payloads
/// under the universe's own symbol and fires the selection event with them.
/// The selection policy itself lives with the algorithm.
#[derive(Debug, Clone)]
pub struct Universe {
    pub symbol: Symbol,
    pub config: SubscriptionConfig,
}

impl Universe {
    /// Coarse-fundamental universe fed directly from the exchange.
    pub fn coarse(name: &str) -> Universe {
        let symbol = Symbol::new(format!("UNIVERSE-COARSE-{name}"));
        let config = SubscriptionConfig::new(
            symbol.clone(),
            SecurityType::Base,
            Venue::SIM,
            Resolution::Second,
        )
        .fill_forward(false)
        .with_data_kind(DataKind::Coarse);
        Universe { symbol, config }
    }
}

/// Callback fired by the frontier loop when a universe subscription
/// produced data: `(universe, config, frontier, payload)`.
pub type UniverseSelectionHandler =
    Arc<dyn Fn(&Universe, &SubscriptionConfig, DateTime<Utc>, &[BaseData]) + Send + Sync>;

/// The algorithm as the feed sees it: which securities and universes to
/// follow and the ambient context frozen into each slice.
pub trait Algorithm: Send + Sync {
    fn securities(&self) -> Vec<Security>;

    fn universes(&self) -> Vec<Arc<Universe>> {
        Vec::new()
    }

    fn time_zone(&self) -> Tz;

    fn cash_book(&self) -> CashBook;

    /// Source for custom-data subscriptions; such data never routes through
    /// the exchange. Returning `None` fails subscription construction.
    fn custom_enumerator(
        &self,
        _config: &SubscriptionConfig,
        _clock: &Arc<dyn TimeProvider>,
    ) -> Option<Box<dyn DataEnumerator>> {
        None
    }
}

/// Sink for feed-level diagnostics surfaced to the user.
pub trait ResultHandler: Send + Sync {
    fn runtime_error(&self, message: &str);

    fn debug_message(&self, _message: &str) {}
}

/// Discards everything; useful default for tests.
pub struct NullResultHandler;

impl ResultHandler for NullResultHandler {
    fn runtime_error(&self, message: &str) {
        tracing::error!("algorithm runtime error: {message}");
    }
}
