pub mod algorithm;
pub mod bridge;
pub mod clock;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod queue;
pub mod subscriptions;
pub mod time_slice;
