use crate::algorithm::{Algorithm, ResultHandler, Universe, UniverseSelectionHandler};
use crate::bridge::{Bridge, BridgeConsumer, bridge};
use crate::clock::{RealTimeProvider, TimeProvider, round_down};
use crate::error::FeedError;
use crate::exchange::{DataExchange, DataHandler, FatalPredicate};
use crate::queue::{DataQueueHandler, create_data_queue_handler};
use crate::subscriptions::DataEnumerator;
use crate::subscriptions::aggregator::{AggregatorCell, TickAggregatorEnumerator};
use crate::subscriptions::enqueue::EnqueueEnumerator;
use crate::subscriptions::fill_forward::FillForwardEnumerator;
use crate::subscriptions::filter::SubscriptionFilterEnumerator;
use crate::subscriptions::subscription::{SharedPrice, Subscription};
use crate::time_slice::{SecurityChanges, SecuritySliceData, TimeSlice};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tf_types::base_data::BaseData;
use tf_types::config::{DataKind, FeedSettings, LiveJob, SubscriptionConfig};
use tf_types::keys::SubscriptionKey;
use tf_types::securities::security::Security;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Live data feed: owns the fan-out exchange and every subscription, drives
/// them under a wall-clock frontier and publishes consolidated time slices
/// to the bridge.
pub struct LiveDataFeed {
    settings: FeedSettings,
    clock: Arc<dyn TimeProvider>,
    upstream: Arc<dyn DataQueueHandler>,
    exchange: Arc<DataExchange>,
    subscriptions: Arc<DashMap<SubscriptionKey, Subscription>>,
    bridge: Bridge,
    token: CancellationToken,
    is_active: AtomicBool,
    pending_changes: Mutex<SecurityChanges>,
    universe_handler: RwLock<Option<UniverseSelectionHandler>>,
    algorithm: Arc<dyn Algorithm>,
    job: LiveJob,
    result_handler: Arc<dyn ResultHandler>,
}

impl LiveDataFeed {
    /// Wire the feed up for a live job: resolve the upstream adapter, start
    /// the exchange consumer and build one subscription per security and
    /// universe the algorithm currently holds.
    ///
    /// `clock` and `upstream` are injectable; they default to the system
    /// clock and the adapter named by the job's `data-queue-handler`.
    pub fn initialize(
        algorithm: Arc<dyn Algorithm>,
        job: LiveJob,
        result_handler: Arc<dyn ResultHandler>,
        clock: Option<Arc<dyn TimeProvider>>,
        upstream: Option<Arc<dyn DataQueueHandler>>,
    ) -> Result<(LiveDataFeed, BridgeConsumer)> {
        let settings = FeedSettings::default();
        let clock = clock.unwrap_or_else(|| Arc::new(RealTimeProvider));
        let upstream = match upstream {
            Some(u) => u,
            None => create_data_queue_handler(&job.data_queue_handler)?,
        };
        let token = CancellationToken::new();
        let exchange = DataExchange::new(
            upstream.clone(),
            token.child_token(),
            settings
                .empty_poll_backoff
                .to_std()
                .unwrap_or(std::time::Duration::from_millis(5)),
        );
        let (bridge, consumer) = bridge(settings.bridge_capacity);

        let feed = LiveDataFeed {
            settings,
            clock,
            upstream,
            exchange,
            subscriptions: Arc::new(DashMap::new()),
            bridge,
            token,
            is_active: AtomicBool::new(false),
            pending_changes: Mutex::new(SecurityChanges::none()),
            universe_handler: RwLock::new(None),
            algorithm: algorithm.clone(),
            job,
            result_handler,
        };

        feed.exchange.begin_consume();

        let utc_start = feed.clock.now();
        let utc_end = utc_start + Duration::days(365 * 50);
        for security in algorithm.securities() {
            feed.register_subscription(security, utc_start, utc_end, false, None)?;
        }
        for universe in algorithm.universes() {
            let security = Security {
                symbol: universe.symbol.clone(),
                security_type: universe.config.security_type,
                venue: tf_types::securities::symbols::Venue::SIM,
                config: universe.config.clone(),
            };
            feed.register_subscription(security, utc_start, utc_end, false, Some(universe))?;
        }

        info!(
            deployment = %feed.job.deployment_id,
            subscriptions = feed.subscriptions.len(),
            "feed: initialized"
        );
        Ok((feed, consumer))
    }

    /// Event sink for universe selection; fired with
    /// `(universe, config, frontier, payload)`.
    pub fn set_universe_selection_handler(&self, handler: UniverseSelectionHandler) {
        *self
            .universe_handler
            .write()
            .expect("universe handler lock poisoned") = Some(handler);
    }

    /// Treat errors thrown out of per-symbol handlers or the upstream poll
    /// as fatal or recoverable.
    pub fn set_error_predicate(&self, predicate: FatalPredicate) {
        self.exchange.set_error_handler(predicate);
    }

    pub fn add_subscription(
        &self,
        security: Security,
        utc_start: DateTime<Utc>,
        utc_end: DateTime<Utc>,
        is_user_defined: bool,
    ) -> Result<()> {
        self.register_subscription(security.clone(), utc_start, utc_end, is_user_defined, None)?;
        self.pending_changes
            .lock()
            .expect("changes lock poisoned")
            .add(security);
        Ok(())
    }

    pub fn remove_subscription(&self, security: &Security) -> bool {
        let key = SubscriptionKey::new(security.symbol.clone(), security.security_type);
        let Some((_, removed)) = self.subscriptions.remove(&key) else {
            return false;
        };
        // Custom data never routed through the exchange or the upstream.
        if !removed.config.is_custom_data {
            self.exchange.remove_handler(&security.symbol);
            let symbols = one_symbol_map(security);
            if let Err(e) = self.upstream.unsubscribe(&self.job, &symbols) {
                warn!(%key, "feed: upstream unsubscribe failed: {e:#}");
            }
        }
        self.pending_changes
            .lock()
            .expect("changes lock poisoned")
            .remove(removed.security.clone());
        info!(%key, "feed: subscription removed");
        true
    }

    /// Snapshot of the registered subscription identities.
    pub fn subscriptions(&self) -> Vec<SubscriptionKey> {
        self.subscriptions.iter().map(|e| e.key().clone()).collect()
    }

    /// Latest traded price observed for a subscription, independent of bar
    /// emission.
    pub fn realtime_price(&self, key: &SubscriptionKey) -> Option<Decimal> {
        self.subscriptions.get(key).map(|s| s.realtime_price())
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// Request shutdown. Idempotent; both the frontier loop and the
    /// exchange consumer exit within one sleep period.
    pub fn exit(&self) {
        info!("feed: exit requested");
        self.token.cancel();
    }

    /// Frontier loop. Blocks until [`exit`](Self::exit) or a bridge
    /// shutdown.
    pub async fn run(&self) {
        info!("feed: frontier loop starting");
        self.is_active.store(true, Ordering::SeqCst);
        let algorithm_tz = self.algorithm.time_zone();
        let mut next_emit: Option<DateTime<Utc>> = None;
        let mut last_emit: Option<DateTime<Utc>> = None;

        'frontier: loop {
            if self.token.is_cancelled() {
                break;
            }
            let any_tick = self
                .subscriptions
                .iter()
                .any(|e| e.value().config.resolution.is_tick());
            let sleep_step = if any_tick {
                Duration::milliseconds(1)
            } else {
                Duration::seconds(1)
            };
            let frontier = self.clock.now();
            let mut rounding = sleep_step;
            let mut data: Vec<SecuritySliceData> = Vec::new();
            let mut universe_batches: Vec<(Arc<Universe>, SubscriptionConfig, Vec<BaseData>)> =
                Vec::new();

            for mut entry in self.subscriptions.iter_mut() {
                let sub = entry.value_mut();
                let mut batch: Vec<BaseData> = Vec::new();
                loop {
                    if sub.needs_advance && !sub.advance() {
                        break;
                    }
                    let end_time = match sub.current.as_ref() {
                        Some(item) => item.end_time(),
                        None => {
                            sub.needs_advance = true;
                            break;
                        }
                    };
                    if end_time > frontier {
                        // Not ripe yet; keep it for a later frontier.
                        sub.needs_advance = false;
                        break;
                    }
                    batch.push(sub.current.take().expect("current present"));
                    sub.needs_advance = true;
                }
                if batch.is_empty() {
                    continue;
                }
                if sub.config.resolution.is_tick() {
                    rounding = Duration::milliseconds(1);
                }
                if let Some(universe) = sub.universe.clone() {
                    universe_batches.push((universe, sub.config.clone(), batch.clone()));
                }
                data.push(SecuritySliceData {
                    security: sub.security.clone(),
                    items: batch,
                });
            }

            if self.token.is_cancelled() {
                break;
            }

            // Selection results must not overtake slices already queued for
            // the downstream, so wait for bridge capacity before firing.
            for (universe, config, batch) in universe_batches {
                if !self.bridge.wait_for_capacity(&self.token).await {
                    break 'frontier;
                }
                let handler = self
                    .universe_handler
                    .read()
                    .expect("universe handler lock poisoned")
                    .clone();
                if let Some(handler) = handler {
                    handler(&universe, &config, frontier, &batch);
                }
            }

            let heartbeat_due = next_emit.is_none_or(|t| frontier >= t);
            if !data.is_empty() || heartbeat_due {
                let mut emit_time = round_down(frontier, rounding);
                if let Some(last) = last_emit {
                    emit_time = emit_time.max(last);
                }
                let changes = std::mem::take(
                    &mut *self.pending_changes.lock().expect("changes lock poisoned"),
                );
                let slice = TimeSlice::create(
                    emit_time,
                    algorithm_tz,
                    self.algorithm.cash_book(),
                    data,
                    changes,
                );
                if !self.bridge.add(slice, &self.token).await {
                    if !self.token.is_cancelled() {
                        self.result_handler
                            .runtime_error("data feed bridge closed by the consumer");
                    }
                    break;
                }
                next_emit = Some(emit_time + self.settings.heartbeat);
                last_emit = Some(emit_time);
            }

            let now = self.clock.now();
            let boundary = round_down(now + sleep_step, sleep_step);
            let pause = (boundary - now).max(Duration::milliseconds(1));
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(pause.to_std().unwrap_or(std::time::Duration::from_millis(1))) => {}
            }
        }

        // Stop the dispatcher too, whatever path ended the loop.
        self.token.cancel();
        self.is_active.store(false, Ordering::SeqCst);
        info!("feed: frontier loop stopped");
    }

    /// Build and register one subscription. The upstream subscribe happens
    /// before registration: on failure nothing is registered and the
    /// exchange handler installed during construction is rolled back.
    /// Custom data is read locally and never touches the upstream adapter.
    fn register_subscription(
        &self,
        security: Security,
        utc_start: DateTime<Utc>,
        utc_end: DateTime<Utc>,
        is_user_defined: bool,
        universe: Option<Arc<Universe>>,
    ) -> Result<()> {
        let key = SubscriptionKey::new(security.symbol.clone(), security.security_type);
        if self.subscriptions.contains_key(&key) {
            return Err(FeedError::DuplicateSubscription(key).into());
        }
        let routes_through_exchange = !security.config.is_custom_data;
        let subscription =
            self.build_subscription(security.clone(), utc_start, utc_end, is_user_defined, universe)?;
        if routes_through_exchange {
            let symbols = one_symbol_map(&security);
            if let Err(e) = self.upstream.subscribe(&self.job, &symbols) {
                self.exchange.remove_handler(&security.symbol);
                return Err(e);
            }
        }
        self.subscriptions.insert(key.clone(), subscription);
        info!(%key, resolution = %security.config.resolution, "feed: subscription added");
        Ok(())
    }

    /// Two-phase construction: allocate the shared cells, install the
    /// exchange handler over them, then wire and prime the enumerator
    /// chain. No cycle at the object level, only closures over the cells.
    fn build_subscription(
        &self,
        security: Security,
        utc_start: DateTime<Utc>,
        utc_end: DateTime<Utc>,
        is_user_defined: bool,
        universe: Option<Arc<Universe>>,
    ) -> Result<Subscription> {
        let config = security.config.clone();
        let symbol = security.symbol.clone();
        let price = SharedPrice::new();

        let source: Box<dyn DataEnumerator> = if config.is_custom_data {
            self.algorithm
                .custom_enumerator(&config, &self.clock)
                .ok_or(FeedError::MissingCustomSource(symbol.clone()))?
        } else if config.data_kind == DataKind::Coarse {
            // Bulk selection payloads go straight onto the queue.
            let enumerator = EnqueueEnumerator::new();
            let handle = enumerator.handle();
            let handler: DataHandler = Arc::new(move |item| {
                handle.enqueue(item.clone());
                Ok(())
            });
            self.exchange.set_handler(symbol.clone(), handler);
            Box::new(enumerator)
        } else if config.resolution.is_tick() {
            let enumerator = EnqueueEnumerator::new();
            let handle = enumerator.handle();
            let price_cell = price.clone();
            let handler: DataHandler = Arc::new(move |item| {
                if let Some(tick) = item.as_tick()
                    && tick.last_price != Decimal::ZERO
                {
                    price_cell.set(tick.last_price);
                }
                handle.enqueue(item.clone());
                Ok(())
            });
            self.exchange.set_handler(symbol.clone(), handler);
            Box::new(enumerator)
        } else {
            let cell = AggregatorCell::new(
                symbol.clone(),
                config.increment,
                config.time_zone,
                self.clock.clone(),
            );
            let price_cell = price.clone();
            let process_cell = cell.clone();
            let handler: DataHandler = Arc::new(move |item| {
                if let Some(tick) = item.as_tick() {
                    if tick.last_price != Decimal::ZERO {
                        price_cell.set(tick.last_price);
                    }
                    process_cell.process(tick);
                }
                Ok(())
            });
            self.exchange.set_handler(symbol.clone(), handler);
            Box::new(TickAggregatorEnumerator::new(cell))
        };

        let source: Box<dyn DataEnumerator> = if config.fill_data_forward
            && !config.resolution.is_tick()
            && !config.is_custom_data
            && config.data_kind != DataKind::Coarse
        {
            Box::new(FillForwardEnumerator::new(
                source,
                self.clock.clone(),
                security.market_hours(),
                config.increment,
                config.extended_market_hours,
                utc_end,
            ))
        } else {
            source
        };

        let source = Box::new(SubscriptionFilterEnumerator::new(
            source,
            symbol.clone(),
            utc_end,
        ));

        Ok(Subscription::new(
            security,
            source,
            price,
            utc_start,
            utc_end,
            is_user_defined,
            universe,
        ))
    }
}

fn one_symbol_map(
    security: &Security,
) -> HashMap<tf_types::securities::symbols::SecurityType, Vec<tf_types::securities::symbols::Symbol>>
{
    let mut map = HashMap::new();
    map.insert(security.security_type, vec![security.symbol.clone()]);
    map
}
