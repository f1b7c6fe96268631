use crate::clock::{TimeProvider, round_down_local};
use crate::subscriptions::DataEnumerator;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tf_types::base_data::{BaseData, Tick, TradeBar};
use tf_types::securities::symbols::Symbol;

// Working-bar accumulator. OHLC stay unset until the first priced tick so a
// leading run of quote-only ticks cannot pin the open at zero.
struct WorkingBar {
    start: DateTime<Utc>,
    o: Option<Decimal>,
    h: Option<Decimal>,
    l: Option<Decimal>,
    c: Option<Decimal>,
    vol: Decimal,
}

impl WorkingBar {
    fn open_at(start: DateTime<Utc>) -> WorkingBar {
        WorkingBar {
            start,
            o: None,
            h: None,
            l: None,
            c: None,
            vol: Decimal::ZERO,
        }
    }

    fn apply(&mut self, tick: &Tick) {
        if tick.last_price != Decimal::ZERO {
            if self.o.is_none() {
                self.o = Some(tick.last_price);
            }
            self.h = Some(self.h.map_or(tick.last_price, |x| x.max(tick.last_price)));
            self.l = Some(self.l.map_or(tick.last_price, |x| x.min(tick.last_price)));
            self.c = Some(tick.last_price);
        }
        // Quote-only ticks still contribute size.
        self.vol += tick.quantity;
    }

    fn into_bar(self, symbol: Symbol, period: Duration) -> TradeBar {
        TradeBar {
            symbol,
            time: self.start,
            end_time: self.start + period,
            open: self.o.unwrap_or(Decimal::ZERO),
            high: self.h.unwrap_or(Decimal::ZERO),
            low: self.l.unwrap_or(Decimal::ZERO),
            close: self.c.unwrap_or(Decimal::ZERO),
            volume: self.vol,
        }
    }
}

struct State {
    working: Option<WorkingBar>,
    ready: VecDeque<TradeBar>,
}

/// Shared aggregation state: written by the dispatcher via [`process`],
/// drained by the frontier via the enumerator. At most one working bar
/// exists at any time; rollover moves it to the ready queue so bars come
/// out strictly in increasing start time.
///
/// [`process`]: AggregatorCell::process
pub struct AggregatorCell {
    symbol: Symbol,
    period: Duration,
    tz: Tz,
    clock: Arc<dyn TimeProvider>,
    state: Mutex<State>,
}

impl AggregatorCell {
    pub fn new(
        symbol: Symbol,
        period: Duration,
        tz: Tz,
        clock: Arc<dyn TimeProvider>,
    ) -> Arc<AggregatorCell> {
        Arc::new(AggregatorCell {
            symbol,
            period,
            tz,
            clock,
            state: Mutex::new(State {
                working: None,
                ready: VecDeque::new(),
            }),
        })
    }

    /// Fold one tick into the current window. The window open is the wall
    /// clock floored onto the bar boundary in the instrument's local zone.
    pub fn process(&self, tick: &Tick) {
        let start = round_down_local(self.clock.now(), self.period, self.tz);
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        if state.working.as_ref().is_some_and(|w| start > w.start) {
            let done = state
                .working
                .take()
                .expect("working bar present")
                .into_bar(self.symbol.clone(), self.period);
            state.ready.push_back(done);
        }
        if let Some(working) = state.working.as_mut() {
            working.apply(tick);
        } else {
            let mut bar = WorkingBar::open_at(start);
            bar.apply(tick);
            state.working = Some(bar);
        }
    }

    fn poll(&self) -> Option<TradeBar> {
        let mut state = self.state.lock().expect("aggregator lock poisoned");
        if let Some(bar) = state.ready.pop_front() {
            return Some(bar);
        }
        let due = state
            .working
            .as_ref()
            .map(|w| w.start + self.period <= self.clock.now())
            .unwrap_or(false);
        if due {
            let done = state.working.take().expect("working bar present");
            return Some(done.into_bar(self.symbol.clone(), self.period));
        }
        None
    }
}

/// Lazy `TradeBar` sequence over an [`AggregatorCell`]. Never terminates.
pub struct TickAggregatorEnumerator {
    cell: Arc<AggregatorCell>,
    current: Option<BaseData>,
}

impl TickAggregatorEnumerator {
    pub fn new(cell: Arc<AggregatorCell>) -> TickAggregatorEnumerator {
        TickAggregatorEnumerator {
            cell,
            current: None,
        }
    }
}

impl DataEnumerator for TickAggregatorEnumerator {
    fn advance(&mut self) -> bool {
        self.current = self.cell.poll().map(BaseData::Bar);
        true
    }

    fn current(&self) -> Option<&BaseData> {
        self.current.as_ref()
    }
}
