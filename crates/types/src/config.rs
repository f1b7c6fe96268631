use crate::base_data::Resolution;
use crate::securities::symbols::{SecurityType, Symbol, Venue};
use chrono::Duration;
use chrono_tz::{America, Tz};
use strum_macros::Display;

/// What a subscription's items decode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DataKind {
    Tick,
    TradeBar,
    Coarse,
}

/// Immutable per-subscription settings. Built once when the subscription is
/// created and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionConfig {
    pub symbol: Symbol,
    pub security_type: SecurityType,
    pub resolution: Resolution,
    /// Step between consecutive emitted items; defaults to the resolution's
    /// window length and doubles as the fill-forward step.
    pub increment: Duration,
    /// Zone the instrument's local clock runs in, used for bar window
    /// alignment.
    pub time_zone: Tz,
    /// Custom data is read from a caller-supplied source, never routed
    /// through the exchange.
    pub is_custom_data: bool,
    /// Synthesize bars during quiet open-market intervals.
    pub fill_data_forward: bool,
    /// Include pre/post market sessions when gating fill-forward.
    pub extended_market_hours: bool,
    pub data_kind: DataKind,
}

impl SubscriptionConfig {
    pub fn new(
        symbol: Symbol,
        security_type: SecurityType,
        venue: Venue,
        resolution: Resolution,
    ) -> SubscriptionConfig {
        let time_zone = match venue {
            Venue::NYSE | Venue::NASDAQ | Venue::FXCM => America::New_York,
            Venue::SIM => chrono_tz::UTC,
        };
        let data_kind = if resolution.is_tick() {
            DataKind::Tick
        } else {
            DataKind::TradeBar
        };
        SubscriptionConfig {
            symbol,
            security_type,
            resolution,
            increment: resolution.increment(),
            time_zone,
            is_custom_data: false,
            fill_data_forward: true,
            extended_market_hours: false,
            data_kind,
        }
    }

    pub fn fill_forward(mut self, enabled: bool) -> Self {
        self.fill_data_forward = enabled;
        self
    }

    pub fn extended_hours(mut self, enabled: bool) -> Self {
        self.extended_market_hours = enabled;
        self
    }

    pub fn custom_data(mut self, enabled: bool) -> Self {
        self.is_custom_data = enabled;
        self
    }

    pub fn increment(mut self, increment: Duration) -> Self {
        self.increment = increment;
        self
    }

    pub fn with_data_kind(mut self, data_kind: DataKind) -> Self {
        self.data_kind = data_kind;
        self
    }
}

/// Live deployment packet handed to the feed. Names the upstream adapter to
/// instantiate; everything else flows through the algorithm object.
#[derive(Debug, Clone)]
pub struct LiveJob {
    pub deployment_id: String,
    /// Registered name of the upstream queue adapter
    /// (configuration key `data-queue-handler`).
    pub data_queue_handler: String,
}

impl LiveJob {
    pub fn new(deployment_id: impl Into<String>, data_queue_handler: impl Into<String>) -> Self {
        LiveJob {
            deployment_id: deployment_id.into(),
            data_queue_handler: data_queue_handler.into(),
        }
    }
}

/// Feed-level knobs with environment overrides.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Dispatcher sleep after a poll in which nothing was routed.
    pub empty_poll_backoff: Duration,
    /// Bounded capacity of the bridge to the downstream consumer.
    pub bridge_capacity: usize,
    /// Maximum quiet interval between emitted slices.
    pub heartbeat: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        let empty_poll_backoff_ms = std::env::var("TF_FEED_EMPTY_POLL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5i64);
        let bridge_capacity = std::env::var("TF_FEED_BRIDGE_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4096usize);
        let heartbeat_ms = std::env::var("TF_FEED_HEARTBEAT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1_000i64);
        Self {
            empty_poll_backoff: Duration::milliseconds(empty_poll_backoff_ms.max(1)),
            bridge_capacity: bridge_capacity.max(1),
            heartbeat: Duration::milliseconds(heartbeat_ms.max(1)),
        }
    }
}
