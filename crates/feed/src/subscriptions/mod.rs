pub mod aggregator;
pub mod enqueue;
pub mod fill_forward;
pub mod filter;
pub mod subscription;

use tf_types::base_data::BaseData;

/// A polled live sequence.
///
/// `advance` never blocks: `true` means the sequence has not terminated,
/// and `current` may still be `None` when nothing is ready right now.
/// Termination (`false`) is decoupled from "no item at this instant" on
/// purpose; live sources return `true` forever.
///
/// `Send + Sync` because subscriptions holding these live in the feed's
/// concurrent registry; all mutation goes through `&mut self` on the
/// frontier task.
pub trait DataEnumerator: Send + Sync {
    fn advance(&mut self) -> bool;
    fn current(&self) -> Option<&BaseData>;
}
