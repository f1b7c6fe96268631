use crate::error::FeedError;
use anyhow::Result;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tf_types::base_data::BaseData;
use tf_types::config::LiveJob;
use tf_types::securities::symbols::{SecurityType, Symbol};

/// Upstream source of raw market events, polled by the exchange consumer.
///
/// `next_ticks` must return quickly (empty when nothing is pending);
/// `subscribe`/`unsubscribe` are idempotent and additive.
pub trait DataQueueHandler: Send + Sync {
    fn next_ticks(&self) -> Result<Vec<BaseData>>;

    fn subscribe(
        &self,
        job: &LiveJob,
        symbols: &HashMap<SecurityType, Vec<Symbol>>,
    ) -> Result<()>;

    fn unsubscribe(
        &self,
        job: &LiveJob,
        symbols: &HashMap<SecurityType, Vec<Symbol>>,
    ) -> Result<()>;
}

/// Process-local upstream adapter: producers push into a lock-free queue,
/// the consumer drains it. Used by tests and local simulation runs.
#[derive(Default)]
pub struct InMemoryQueueHandler {
    queue: SegQueue<BaseData>,
    subscribed: DashMap<Symbol, SecurityType>,
}

impl InMemoryQueueHandler {
    pub fn new() -> Arc<InMemoryQueueHandler> {
        Arc::new(InMemoryQueueHandler::default())
    }

    pub fn push(&self, item: BaseData) {
        self.queue.push(item);
    }

    pub fn is_subscribed(&self, symbol: &Symbol) -> bool {
        self.subscribed.contains_key(symbol)
    }
}

impl DataQueueHandler for InMemoryQueueHandler {
    fn next_ticks(&self) -> Result<Vec<BaseData>> {
        let mut out = Vec::new();
        while let Some(item) = self.queue.pop() {
            out.push(item);
        }
        Ok(out)
    }

    fn subscribe(
        &self,
        _job: &LiveJob,
        symbols: &HashMap<SecurityType, Vec<Symbol>>,
    ) -> Result<()> {
        for (security_type, syms) in symbols {
            for s in syms {
                self.subscribed.insert(s.clone(), *security_type);
            }
        }
        Ok(())
    }

    fn unsubscribe(
        &self,
        _job: &LiveJob,
        symbols: &HashMap<SecurityType, Vec<Symbol>>,
    ) -> Result<()> {
        for syms in symbols.values() {
            for s in syms {
                self.subscribed.remove(s);
            }
        }
        Ok(())
    }
}

/// Instantiate the upstream adapter named by the job's
/// `data-queue-handler` setting.
pub fn create_data_queue_handler(name: &str) -> Result<Arc<dyn DataQueueHandler>> {
    match name {
        "sim" | "in-memory" => Ok(InMemoryQueueHandler::new()),
        other => Err(FeedError::UnknownQueueHandler(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_idempotent() {
        let q = InMemoryQueueHandler::new();
        let job = LiveJob::new("test", "sim");
        let mut map = HashMap::new();
        map.insert(SecurityType::Equity, vec![Symbol::new("SPY")]);
        q.subscribe(&job, &map).unwrap();
        q.subscribe(&job, &map).unwrap();
        assert!(q.is_subscribed(&Symbol::new("SPY")));
        q.unsubscribe(&job, &map).unwrap();
        assert!(!q.is_subscribed(&Symbol::new("SPY")));
        q.unsubscribe(&job, &map).unwrap();
    }

    #[test]
    fn factory_rejects_unknown_names() {
        assert!(create_data_queue_handler("sim").is_ok());
        assert!(create_data_queue_handler("no-such-adapter").is_err());
    }
}
