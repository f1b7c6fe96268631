use crate::securities::symbols::Symbol;
pub use chrono::{DateTime, Utc};
use chrono::Duration;
pub use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

pub type Price = Decimal;
pub type Volume = Decimal;

/// Emission cadence of a subscription.
///
/// - [`Tick`] – raw market events, no aggregation.
/// - [`Second`] / [`Minute`] / [`Hour`] – fixed-duration OHLCV bars.
/// - [`Daily`] – one bar per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    /// Bar window length. Tick resolution has no window; callers that need
    /// a step (fill-forward, frontier rounding) get one second.
    pub fn increment(&self) -> Duration {
        match self {
            Resolution::Tick | Resolution::Second => Duration::seconds(1),
            Resolution::Minute => Duration::minutes(1),
            Resolution::Hour => Duration::hours(1),
            Resolution::Daily => Duration::days(1),
        }
    }

    #[inline]
    pub fn is_tick(&self) -> bool {
        matches!(self, Resolution::Tick)
    }
}

/// A single market event: bid/ask/last and an optional traded quantity.
///
/// A quote-only tick carries `last_price = 0` and contributes its quantity
/// but never open/high/low/close during aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument identifier (e.g. `"SPY"`, `"EURUSD"`).
    pub symbol: Symbol,
    /// UTC timestamp of the event.
    pub time: DateTime<Utc>,
    /// Best bid at the event, zero if unknown.
    pub bid_price: Price,
    /// Best ask at the event, zero if unknown.
    pub ask_price: Price,
    /// Trade price; zero for quote-only events.
    pub last_price: Price,
    /// Traded size; zero for quote-only events.
    pub quantity: Volume,
}

/// An OHLCV aggregate over one fixed time window for one symbol.
///
/// `time` is the window open and `end_time` the exclusive window close, so
/// `end_time - time` is always the bar period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradeBar {
    pub symbol: Symbol,
    /// Window open (inclusive), UTC.
    pub time: DateTime<Utc>,
    /// Window close (exclusive), UTC.
    pub end_time: DateTime<Utc>,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    /// Total traded volume, including quote-only tick quantities.
    pub volume: Volume,
}

impl TradeBar {
    pub fn period(&self) -> Duration {
        self.end_time - self.time
    }

    /// Clone of this bar shifted one `step` forward in time; prices and
    /// volume are carried unchanged.
    pub fn advanced_by(&self, step: Duration) -> TradeBar {
        TradeBar {
            time: self.time + step,
            end_time: self.end_time + step,
            ..self.clone()
        }
    }
}

/// One row of a coarse universe-selection payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoarseFundamental {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub price: Price,
    pub volume: Volume,
    pub dollar_volume: Price,
}

/// Bulk universe-selection payload routed under the universe's own symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoarseBatch {
    /// Symbol of the universe subscription this payload belongs to.
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub entries: Vec<CoarseFundamental>,
}

/// Closed variant over everything the feed routes, aggregates and emits.
/// Handlers and consumers dispatch on the discriminator and stay exhaustive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseData {
    Tick(Tick),
    Bar(TradeBar),
    Coarse(CoarseBatch),
}

impl BaseData {
    pub fn symbol(&self) -> &Symbol {
        match self {
            BaseData::Tick(t) => &t.symbol,
            BaseData::Bar(b) => &b.symbol,
            BaseData::Coarse(c) => &c.symbol,
        }
    }

    /// Event start time (UTC). Equals [`end_time`](Self::end_time) for
    /// instantaneous items.
    pub fn time(&self) -> DateTime<Utc> {
        match self {
            BaseData::Tick(t) => t.time,
            BaseData::Bar(b) => b.time,
            BaseData::Coarse(c) => c.time,
        }
    }

    /// Time at which this item is complete and may pass the frontier.
    pub fn end_time(&self) -> DateTime<Utc> {
        match self {
            BaseData::Tick(t) => t.time,
            BaseData::Bar(b) => b.end_time,
            BaseData::Coarse(c) => c.time,
        }
    }

    /// Representative price of the item.
    pub fn value(&self) -> Price {
        match self {
            BaseData::Tick(t) => t.last_price,
            BaseData::Bar(b) => b.close,
            BaseData::Coarse(_) => Decimal::ZERO,
        }
    }

    pub fn as_bar(&self) -> Option<&TradeBar> {
        match self {
            BaseData::Bar(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_tick(&self) -> Option<&Tick> {
        match self {
            BaseData::Tick(t) => Some(t),
            _ => None,
        }
    }
}
