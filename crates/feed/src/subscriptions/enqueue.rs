use crate::subscriptions::DataEnumerator;
use crossbeam::queue::SegQueue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tf_types::base_data::BaseData;

struct Shared {
    queue: SegQueue<BaseData>,
    stopped: AtomicBool,
}

/// Producer side of an [`EnqueueEnumerator`]; cloneable into exchange
/// handlers running on the dispatcher task.
#[derive(Clone)]
pub struct EnqueueHandle {
    shared: Arc<Shared>,
}

impl EnqueueHandle {
    pub fn enqueue(&self, item: BaseData) {
        self.shared.queue.push(item);
    }

    /// After a stop, the enumerator drains what is queued and then
    /// terminates.
    pub fn stop(&self) {
        self.shared.stopped.store(true, Ordering::Release);
    }
}

/// Lazy sequence over a lock-free FIFO. Consumers poll; an empty queue
/// yields `current = None` with `advance() == true` until stopped.
pub struct EnqueueEnumerator {
    shared: Arc<Shared>,
    current: Option<BaseData>,
}

impl EnqueueEnumerator {
    pub fn new() -> EnqueueEnumerator {
        EnqueueEnumerator {
            shared: Arc::new(Shared {
                queue: SegQueue::new(),
                stopped: AtomicBool::new(false),
            }),
            current: None,
        }
    }

    pub fn handle(&self) -> EnqueueHandle {
        EnqueueHandle {
            shared: self.shared.clone(),
        }
    }
}

impl Default for EnqueueEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DataEnumerator for EnqueueEnumerator {
    fn advance(&mut self) -> bool {
        match self.shared.queue.pop() {
            Some(item) => {
                self.current = Some(item);
                true
            }
            None => {
                self.current = None;
                !self.shared.stopped.load(Ordering::Acquire)
            }
        }
    }

    fn current(&self) -> Option<&BaseData> {
        self.current.as_ref()
    }
}
