//! Subscription Port (Driven Port)
//!
//! Interface for registering instruments with the realtime price feed.

use async_trait::async_trait;

/// Subscription port error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubscriptionError {
    /// The feed task is no longer running.
    #[error("Realtime feed stopped")]
    FeedStopped,
}

/// Port for the realtime price feed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionPort: Send + Sync {
    /// Start receiving ticks for the given instrument codes.
    async fn subscribe(&self, codes: Vec<String>) -> Result<(), SubscriptionError>;

    /// Stop receiving ticks for the given instrument codes.
    async fn unsubscribe(&self, codes: Vec<String>) -> Result<(), SubscriptionError>;
}
