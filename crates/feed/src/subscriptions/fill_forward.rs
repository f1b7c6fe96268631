use crate::clock::TimeProvider;
use crate::subscriptions::DataEnumerator;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tf_types::base_data::{BaseData, TradeBar};
use tf_types::securities::hours::{MarketHours, SessionKind};

/// Wraps an inner bar sequence and synthesizes bars during quiet intervals.
///
/// When the inner source is silent and one full step has elapsed on the
/// wall clock, the previous bar is re-emitted advanced one step — but only
/// while the market is open (regular hours, or extended too when the
/// subscription asks for them) and only up to the subscription end.
pub struct FillForwardEnumerator {
    inner: Box<dyn DataEnumerator>,
    clock: Arc<dyn TimeProvider>,
    hours: MarketHours,
    step: Duration,
    extended: bool,
    end_utc: DateTime<Utc>,
    previous: Option<TradeBar>,
    /// Inner item held back because a synthetic bar was emitted first.
    pending: Option<BaseData>,
    current: Option<BaseData>,
}

impl FillForwardEnumerator {
    pub fn new(
        inner: Box<dyn DataEnumerator>,
        clock: Arc<dyn TimeProvider>,
        hours: MarketHours,
        step: Duration,
        extended: bool,
        end_utc: DateTime<Utc>,
    ) -> FillForwardEnumerator {
        FillForwardEnumerator {
            inner,
            clock,
            hours,
            step,
            extended,
            end_utc,
            previous: None,
            pending: None,
            current: None,
        }
    }

    fn session_kind(&self) -> SessionKind {
        if self.extended {
            SessionKind::Both
        } else {
            SessionKind::Regular
        }
    }

    /// A synthetic window starting at `window_open` is only valid while the
    /// market trades.
    fn market_open_at(&self, window_open: DateTime<Utc>) -> bool {
        self.hours.is_open_with(window_open, self.session_kind())
    }

    fn synthesize(&mut self, previous: &TradeBar) -> BaseData {
        let synthetic = previous.advanced_by(self.step);
        self.previous = Some(synthetic.clone());
        BaseData::Bar(synthetic)
    }
}

impl DataEnumerator for FillForwardEnumerator {
    fn advance(&mut self) -> bool {
        let alive = if self.pending.is_some() {
            true
        } else {
            self.inner.advance()
        };
        let next = match self.pending.take() {
            Some(item) => Some(item),
            None => self.inner.current().cloned(),
        };

        let Some(previous) = self.previous.clone() else {
            if let Some(BaseData::Bar(bar)) = &next {
                self.previous = Some(bar.clone());
            }
            self.current = next;
            return alive;
        };

        let expected_end = previous.end_time + self.step;
        match next {
            Some(item) => {
                let is_gap = item.end_time() > expected_end;
                if is_gap && self.market_open_at(previous.end_time) && expected_end <= self.end_utc
                {
                    // Inner data jumped ahead over an open-market window:
                    // fill one step and hold the real item back.
                    self.current = Some(self.synthesize(&previous));
                    self.pending = Some(item);
                } else {
                    // In sequence, or the gap spans a closed market; pass
                    // the real item through.
                    if let BaseData::Bar(bar) = &item {
                        self.previous = Some(bar.clone());
                    }
                    self.current = Some(item);
                }
            }
            None => {
                let due = expected_end <= self.clock.now();
                if due && expected_end <= self.end_utc && self.market_open_at(previous.end_time) {
                    self.current = Some(self.synthesize(&previous));
                } else {
                    self.current = None;
                }
            }
        }
        alive
    }

    fn current(&self) -> Option<&BaseData> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTimeProvider;
    use crate::subscriptions::enqueue::EnqueueEnumerator;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use tf_types::securities::hours::hours_for_venue;
    use tf_types::securities::symbols::{Symbol, Venue};

    fn bar(start: DateTime<Utc>, close: i64) -> TradeBar {
        TradeBar {
            symbol: Symbol::new("SPY"),
            time: start,
            end_time: start + Duration::minutes(1),
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            volume: Decimal::from(10),
        }
    }

    fn setup(
        start: DateTime<Utc>,
    ) -> (
        FillForwardEnumerator,
        crate::subscriptions::enqueue::EnqueueHandle,
        Arc<ManualTimeProvider>,
    ) {
        let clock = Arc::new(ManualTimeProvider::new(start));
        let inner = EnqueueEnumerator::new();
        let handle = inner.handle();
        let ff = FillForwardEnumerator::new(
            Box::new(inner),
            clock.clone(),
            hours_for_venue(Venue::NYSE),
            Duration::minutes(1),
            false,
            Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap(),
        );
        (ff, handle, clock)
    }

    // 2015-10-08 is a Thursday; noon New York (EDT) = 16:00 UTC, well
    // inside regular hours.
    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 10, 8, 16, 0, 0).unwrap()
    }

    #[test]
    fn passes_inner_bars_through() {
        let (mut ff, handle, _clock) = setup(noon());
        handle.enqueue(BaseData::Bar(bar(noon(), 100)));
        assert!(ff.advance());
        assert_eq!(ff.current().unwrap().value(), Decimal::from(100));
    }

    #[test]
    fn synthesizes_when_quiet_and_market_open() {
        let (mut ff, handle, clock) = setup(noon());
        handle.enqueue(BaseData::Bar(bar(noon(), 100)));
        assert!(ff.advance());

        // The synthetic window has not closed yet: nothing to synthesize.
        clock.advance(Duration::minutes(1));
        assert!(ff.advance());
        assert!(ff.current().is_none());

        // Once the wall clock passes the expected end, the fill appears.
        clock.advance(Duration::minutes(1));
        assert!(ff.advance());
        let synthetic = ff.current().and_then(|d| d.as_bar()).expect("fill bar");
        assert_eq!(synthetic.time, noon() + Duration::minutes(1));
        assert_eq!(synthetic.end_time, noon() + Duration::minutes(2));
        assert_eq!(synthetic.close, Decimal::from(100));

        // Next quiet minute keeps filling from the synthetic bar.
        clock.advance(Duration::minutes(1));
        assert!(ff.advance());
        let second = ff.current().and_then(|d| d.as_bar()).unwrap();
        assert_eq!(second.time, noon() + Duration::minutes(2));
    }

    #[test]
    fn does_not_synthesize_when_market_closed() {
        // 21:30 UTC = 17:30 New York: after the regular close.
        let evening = Utc.with_ymd_and_hms(2015, 10, 8, 21, 30, 0).unwrap();
        let (mut ff, handle, clock) = setup(evening);
        handle.enqueue(BaseData::Bar(bar(evening, 100)));
        assert!(ff.advance());

        clock.advance(Duration::minutes(5));
        assert!(ff.advance());
        assert!(ff.current().is_none());
    }

    #[test]
    fn fills_gap_then_releases_held_bar() {
        let (mut ff, handle, clock) = setup(noon());
        handle.enqueue(BaseData::Bar(bar(noon(), 100)));
        assert!(ff.advance());

        // Inner source jumps two windows ahead.
        handle.enqueue(BaseData::Bar(bar(noon() + Duration::minutes(2), 105)));
        clock.advance(Duration::minutes(3));

        assert!(ff.advance());
        let fill = ff.current().and_then(|d| d.as_bar()).unwrap();
        assert_eq!(fill.time, noon() + Duration::minutes(1));
        assert_eq!(fill.close, Decimal::from(100));

        assert!(ff.advance());
        let real = ff.current().and_then(|d| d.as_bar()).unwrap();
        assert_eq!(real.time, noon() + Duration::minutes(2));
        assert_eq!(real.close, Decimal::from(105));
    }

    #[test]
    fn stops_synthesizing_past_subscription_end() {
        let clock = Arc::new(ManualTimeProvider::new(noon()));
        let inner = EnqueueEnumerator::new();
        let handle = inner.handle();
        let mut ff = FillForwardEnumerator::new(
            Box::new(inner),
            clock.clone(),
            hours_for_venue(Venue::NYSE),
            Duration::minutes(1),
            false,
            noon() + Duration::minutes(1),
        );
        handle.enqueue(BaseData::Bar(bar(noon(), 100)));
        assert!(ff.advance());

        // The next synthetic window would end past the subscription end.
        clock.advance(Duration::minutes(10));
        assert!(ff.advance());
        assert!(ff.current().is_none());
    }
}
