use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tf_feed::algorithm::{Algorithm, NullResultHandler, Universe};
use tf_feed::bridge::BridgeConsumer;
use tf_feed::clock::{ManualTimeProvider, TimeProvider};
use tf_feed::feed::LiveDataFeed;
use tf_feed::queue::InMemoryQueueHandler;
use tf_feed::subscriptions::DataEnumerator;
use tf_feed::subscriptions::enqueue::EnqueueEnumerator;
use tf_types::base_data::{BaseData, CoarseBatch, CoarseFundamental, Resolution, Tick, TradeBar};
use tf_types::cash::{CashBook, Currency};
use tf_types::config::{LiveJob, SubscriptionConfig};
use tf_types::keys::SubscriptionKey;
use tf_types::securities::security::Security;
use tf_types::securities::symbols::{SecurityType, Symbol};
use tokio_util::sync::CancellationToken;

struct TestAlgorithm {
    securities: Vec<Security>,
    universes: Vec<Arc<Universe>>,
    /// Seed for custom-data subscriptions, re-keyed to the requesting
    /// config's symbol.
    custom_bar: Option<TradeBar>,
}

impl TestAlgorithm {
    fn empty() -> Arc<TestAlgorithm> {
        Arc::new(TestAlgorithm {
            securities: vec![],
            universes: vec![],
            custom_bar: None,
        })
    }

    fn with_securities(securities: Vec<Security>) -> Arc<TestAlgorithm> {
        Arc::new(TestAlgorithm {
            securities,
            universes: vec![],
            custom_bar: None,
        })
    }
}

impl Algorithm for TestAlgorithm {
    fn securities(&self) -> Vec<Security> {
        self.securities.clone()
    }

    fn universes(&self) -> Vec<Arc<Universe>> {
        self.universes.clone()
    }

    fn time_zone(&self) -> Tz {
        New_York
    }

    fn cash_book(&self) -> CashBook {
        let mut book = CashBook::new(Currency::USD);
        book.set_cash(Currency::USD, Decimal::from(100_000));
        book
    }

    fn custom_enumerator(
        &self,
        config: &SubscriptionConfig,
        _clock: &Arc<dyn TimeProvider>,
    ) -> Option<Box<dyn DataEnumerator>> {
        let bar = self.custom_bar.as_ref()?;
        let source = EnqueueEnumerator::new();
        let mut bar = bar.clone();
        bar.symbol = config.symbol.clone();
        source.handle().enqueue(BaseData::Bar(bar));
        Some(Box::new(source))
    }
}

fn job() -> LiveJob {
    LiveJob::new("test-deployment", "sim")
}

fn tick(sym: &str, last: &str, qty: i64) -> BaseData {
    BaseData::Tick(Tick {
        symbol: Symbol::new(sym),
        time: Utc::now(),
        bid_price: Decimal::ZERO,
        ask_price: Decimal::ZERO,
        last_price: Decimal::from_str(last).unwrap(),
        quantity: Decimal::from(qty),
    })
}

fn noon_nyc_clock() -> Arc<ManualTimeProvider> {
    let naive = NaiveDateTime::parse_from_str("2015-10-08 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
    Arc::new(ManualTimeProvider::at_local(naive, New_York))
}

async fn next_slice(
    consumer: &mut BridgeConsumer,
    wait: Duration,
) -> Option<tf_feed::time_slice::TimeSlice> {
    let token = CancellationToken::new();
    tokio::time::timeout(wait, consumer.next(&token)).await.ok()?
}

#[tokio::test]
async fn emits_a_heartbeat_slice_within_a_second() {
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        TestAlgorithm::empty(),
        job(),
        Arc::new(NullResultHandler),
        None,
        Some(upstream),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let slice = next_slice(&mut consumer, Duration::from_millis(1500))
        .await
        .expect("heartbeat slice within one second");
    assert!(!slice.has_data());

    feed.exit();
    task.await.unwrap();
    assert!(!feed.is_active());
}

#[tokio::test]
async fn realtime_price_is_observable_before_any_bar() {
    let clock = noon_nyc_clock();
    let spy = Security::new(Symbol::new("SPY"), SecurityType::Equity, Resolution::Minute);
    let upstream = InMemoryQueueHandler::new();
    let (feed, _consumer) = LiveDataFeed::initialize(
        TestAlgorithm::with_securities(vec![spy]),
        job(),
        Arc::new(NullResultHandler),
        Some(clock),
        Some(upstream.clone()),
    )
    .unwrap();

    upstream.push(tick("SPY", "1.2345", 1));
    tokio::time::sleep(Duration::from_millis(100)).await;

    let key = SubscriptionKey::new(Symbol::new("SPY"), SecurityType::Equity);
    assert_eq!(
        feed.realtime_price(&key),
        Some(Decimal::from_str("1.2345").unwrap())
    );
    feed.exit();
}

#[tokio::test]
async fn aggregates_dispatched_ticks_into_a_sliced_bar() {
    let clock = noon_nyc_clock();
    let start = clock.now();
    let spy = Security::new(Symbol::new("SPY"), SecurityType::Equity, Resolution::Second);
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        TestAlgorithm::with_securities(vec![spy]),
        job(),
        Arc::new(NullResultHandler),
        Some(clock.clone()),
        Some(upstream.clone()),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let lasts = ["199.55", "199.56", "199.53", "0", "199.73", "0"];
    let qtys = [10, 5, 20, 0, 20, 0];
    for (last, qty) in lasts.iter().zip(qtys) {
        upstream.push(tick("SPY", last, qty));
    }
    // Let the dispatcher fold everything into the working bar, then close
    // the window.
    tokio::time::sleep(Duration::from_millis(100)).await;
    clock.advance(ChronoDuration::seconds(1));

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut bar = None;
    for _ in 0..5 {
        let Some(slice) = next_slice(&mut consumer, Duration::from_millis(1500)).await else {
            break;
        };
        if let Some(items) = slice.data_for(&Symbol::new("SPY")) {
            bar = items.first().and_then(|d| d.as_bar()).cloned();
            break;
        }
    }
    let bar = bar.expect("bar in a slice");
    assert_eq!(bar.open, Decimal::from_str("199.55").unwrap());
    assert_eq!(bar.high, Decimal::from_str("199.73").unwrap());
    assert_eq!(bar.low, Decimal::from_str("199.53").unwrap());
    assert_eq!(bar.close, Decimal::from_str("199.73").unwrap());
    assert_eq!(bar.volume, Decimal::from(55));
    assert_eq!(bar.time, start);
    assert_eq!(bar.end_time, start + ChronoDuration::seconds(1));

    feed.exit();
    task.await.unwrap();
}

#[tokio::test]
async fn universe_selection_event_fires_with_payload() {
    let universe = Arc::new(Universe::coarse("USA"));
    let algorithm = Arc::new(TestAlgorithm {
        securities: vec![],
        universes: vec![universe.clone()],
        custom_bar: None,
    });
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        algorithm,
        job(),
        Arc::new(NullResultHandler),
        None,
        Some(upstream.clone()),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let selected: Arc<Mutex<Vec<Symbol>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = selected.clone();
    feed.set_universe_selection_handler(Arc::new(move |_universe, _config, _time, data| {
        let mut out = sink.lock().unwrap();
        for item in data {
            if let BaseData::Coarse(batch) = item {
                out.extend(batch.entries.iter().map(|e| e.symbol.clone()));
            }
        }
    }));

    let now = Utc::now();
    let entries: Vec<CoarseFundamental> = ["AAPL", "MSFT", "GOOG", "AMZN", "META"]
        .iter()
        .map(|s| CoarseFundamental {
            symbol: Symbol::new(*s),
            time: now - ChronoDuration::seconds(1),
            price: Decimal::from(100),
            volume: Decimal::from(1_000),
            dollar_volume: Decimal::from(100_000),
        })
        .collect();
    upstream.push(BaseData::Coarse(CoarseBatch {
        symbol: universe.symbol.clone(),
        time: now - ChronoDuration::seconds(1),
        entries,
    }));

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut fired = Vec::new();
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        fired = selected.lock().unwrap().clone();
        if !fired.is_empty() {
            break;
        }
        // Keep the bridge drained so the loop never stalls on capacity.
        while consumer.try_next().is_some() {}
    }
    assert_eq!(fired.len(), 5);
    assert!(fired.contains(&Symbol::new("AAPL")));

    feed.exit();
    task.await.unwrap();
}

#[tokio::test]
async fn data_past_subscription_end_is_never_emitted() {
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        TestAlgorithm::empty(),
        job(),
        Arc::new(NullResultHandler),
        None,
        Some(upstream.clone()),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let eurusd = Security::new(Symbol::new("EURUSD"), SecurityType::Forex, Resolution::Tick);
    let now = Utc::now();
    feed.add_subscription(
        eurusd,
        now - ChronoDuration::hours(2),
        now - ChronoDuration::hours(1),
        true,
    )
    .unwrap();

    for _ in 0..5 {
        upstream.push(tick("EURUSD", "1.10", 1));
    }

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let mut saw_added = false;
    for _ in 0..3 {
        let Some(slice) = next_slice(&mut consumer, Duration::from_millis(1500)).await else {
            break;
        };
        saw_added |= slice
            .security_changes
            .added()
            .iter()
            .any(|s| s.symbol == Symbol::new("EURUSD"));
        assert!(slice.data_for(&Symbol::new("EURUSD")).is_none());
    }
    assert!(saw_added, "added security change should reach a slice");

    feed.exit();
    task.await.unwrap();
}

#[tokio::test]
async fn custom_data_never_touches_the_upstream_adapter() {
    let now = Utc::now();
    let seed = TradeBar {
        symbol: Symbol::new("CUSTOM"),
        time: now - ChronoDuration::seconds(2),
        end_time: now - ChronoDuration::seconds(1),
        open: Decimal::from(42),
        high: Decimal::from(42),
        low: Decimal::from(42),
        close: Decimal::from(42),
        volume: Decimal::ONE,
    };
    let algorithm = Arc::new(TestAlgorithm {
        securities: vec![],
        universes: vec![],
        custom_bar: Some(seed),
    });
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        algorithm,
        job(),
        Arc::new(NullResultHandler),
        None,
        Some(upstream.clone()),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let base = Security::new(Symbol::new("CUSTOM"), SecurityType::Base, Resolution::Minute);
    let config = base.config.clone().custom_data(true);
    let custom = base.with_config(config);
    feed.add_subscription(
        custom.clone(),
        now - ChronoDuration::hours(1),
        now + ChronoDuration::days(1),
        true,
    )
    .unwrap();
    // The upstream adapter never hears about the custom symbol.
    assert!(!upstream.is_subscribed(&Symbol::new("CUSTOM")));

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    // The locally-read bar still reaches a slice.
    let mut saw_bar = false;
    for _ in 0..4 {
        let Some(slice) = next_slice(&mut consumer, Duration::from_millis(1500)).await else {
            break;
        };
        if let Some(items) = slice.data_for(&Symbol::new("CUSTOM")) {
            saw_bar = items.first().and_then(|d| d.as_bar()).is_some();
            break;
        }
    }
    assert!(saw_bar, "custom bar should flow into a slice");

    assert!(feed.remove_subscription(&custom));
    assert!(!upstream.is_subscribed(&Symbol::new("CUSTOM")));

    feed.exit();
    task.await.unwrap();
}

#[tokio::test]
async fn add_and_remove_surface_security_changes() {
    let upstream = InMemoryQueueHandler::new();
    let (feed, mut consumer) = LiveDataFeed::initialize(
        TestAlgorithm::empty(),
        job(),
        Arc::new(NullResultHandler),
        None,
        Some(upstream.clone()),
    )
    .unwrap();
    let feed = Arc::new(feed);

    let runner = feed.clone();
    let task = tokio::spawn(async move { runner.run().await });

    let spy = Security::new(Symbol::new("SPY"), SecurityType::Equity, Resolution::Minute);
    let now = Utc::now();
    feed.add_subscription(spy.clone(), now, now + ChronoDuration::days(1), true)
        .unwrap();
    assert!(upstream.is_subscribed(&Symbol::new("SPY")));
    assert_eq!(feed.subscriptions().len(), 1);

    let mut saw_added = false;
    for _ in 0..4 {
        let Some(slice) = next_slice(&mut consumer, Duration::from_millis(1500)).await else {
            break;
        };
        if slice
            .security_changes
            .added()
            .iter()
            .any(|s| s.symbol == Symbol::new("SPY"))
        {
            saw_added = true;
            break;
        }
    }
    assert!(saw_added);

    assert!(feed.remove_subscription(&spy));
    assert!(!feed.remove_subscription(&spy));
    assert!(!upstream.is_subscribed(&Symbol::new("SPY")));

    let mut saw_removed = false;
    for _ in 0..4 {
        let Some(slice) = next_slice(&mut consumer, Duration::from_millis(1500)).await else {
            break;
        };
        if slice
            .security_changes
            .removed()
            .iter()
            .any(|s| s.symbol == Symbol::new("SPY"))
        {
            saw_removed = true;
            break;
        }
    }
    assert!(saw_removed);

    feed.exit();
    task.await.unwrap();
}
