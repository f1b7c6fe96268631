use crate::queue::DataQueueHandler;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tf_types::base_data::BaseData;
use tf_types::securities::symbols::Symbol;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Per-symbol callback invoked on the consumer task. Must not block; the
/// feed's handlers only push into lock-free structures.
pub type DataHandler = Arc<dyn Fn(&BaseData) -> anyhow::Result<()> + Send + Sync>;

/// Decides whether an error ends consumption. The default treats every
/// error as recoverable.
pub type FatalPredicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Fan-out stage between the upstream queue and the per-symbol pipelines.
///
/// One dedicated consumer task polls `upstream.next_ticks()` and dispatches
/// each item to the handler registered for its symbol, in polled order.
/// Handler installation and removal are concurrent with dispatch.
pub struct DataExchange {
    upstream: Arc<dyn DataQueueHandler>,
    handlers: Arc<DashMap<Symbol, DataHandler>>,
    is_fatal: Arc<RwLock<FatalPredicate>>,
    token: CancellationToken,
    empty_poll_backoff: Duration,
    started: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DataExchange {
    pub fn new(
        upstream: Arc<dyn DataQueueHandler>,
        token: CancellationToken,
        empty_poll_backoff: Duration,
    ) -> Arc<DataExchange> {
        Arc::new(DataExchange {
            upstream,
            handlers: Arc::new(DashMap::new()),
            is_fatal: Arc::new(RwLock::new(Arc::new(|_: &anyhow::Error| false))),
            token,
            empty_poll_backoff,
            started: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Install or replace the handler for `symbol`.
    pub fn set_handler(&self, symbol: Symbol, handler: DataHandler) {
        self.handlers.insert(symbol, handler);
    }

    pub fn remove_handler(&self, symbol: &Symbol) -> bool {
        self.handlers.remove(symbol).is_some()
    }

    /// `true` from the predicate means fatal: the consumer exits on that
    /// error and delivers nothing further.
    pub fn set_error_handler(&self, predicate: FatalPredicate) {
        *self.is_fatal.write().expect("predicate lock poisoned") = predicate;
    }

    /// Start the consumer task. Subsequent calls are no-ops.
    pub fn begin_consume(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let upstream = self.upstream.clone();
        let handlers = self.handlers.clone();
        let is_fatal = self.is_fatal.clone();
        let token = self.token.clone();
        let backoff = self.empty_poll_backoff;
        let handle = tokio::spawn(async move {
            consume_loop(upstream, handlers, is_fatal, token, backoff).await;
        });
        *self.task.lock().expect("task lock poisoned") = Some(handle);
    }

    /// Request termination and wait for the consumer to drain its current
    /// poll and exit.
    pub async fn end_consume(&self) {
        self.token.cancel();
        let handle = self.task.lock().expect("task lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn consume_loop(
    upstream: Arc<dyn DataQueueHandler>,
    handlers: Arc<DashMap<Symbol, DataHandler>>,
    is_fatal: Arc<RwLock<FatalPredicate>>,
    token: CancellationToken,
    backoff: Duration,
) {
    info!("exchange: consumer started");
    let fatal = |e: &anyhow::Error| (is_fatal.read().expect("predicate lock poisoned"))(e);
    loop {
        if token.is_cancelled() {
            break;
        }
        let mut handled = false;
        match upstream.next_ticks() {
            Ok(items) => {
                for item in items {
                    let handler = handlers.get(item.symbol()).map(|h| h.value().clone());
                    if let Some(handler) = handler {
                        handled = true;
                        if let Err(e) = handler(&item) {
                            error!(symbol = %item.symbol(), "exchange: handler error: {e:#}");
                            if fatal(&e) {
                                info!("exchange: consumer exiting on fatal handler error");
                                return;
                            }
                        }
                    } else {
                        debug!(symbol = %item.symbol(), "exchange: no handler, item dropped");
                    }
                }
            }
            Err(e) => {
                error!("exchange: upstream poll error: {e:#}");
                if fatal(&e) {
                    info!("exchange: consumer exiting on fatal poll error");
                    return;
                }
            }
        }
        if !handled {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }
    info!("exchange: consumer stopped");
}
