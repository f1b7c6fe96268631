use tf_types::keys::SubscriptionKey;
use tf_types::securities::symbols::Symbol;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("unknown data queue handler `{0}`")]
    UnknownQueueHandler(String),

    #[error("subscription already registered for {0}")]
    DuplicateSubscription(SubscriptionKey),

    #[error("no custom data source supplied for {0}")]
    MissingCustomSource(Symbol),
}
