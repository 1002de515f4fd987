//! Application Services
//!
//! - `PortfolioService`: caches the account balance, keeps the realtime
//!   feed subscribed to the instruments held, and values the portfolio
//!   against the latest-price board.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AccountError, AccountPort, SubscriptionPort};
use crate::domain::holdings::AccountBalance;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::ticks::PriceBoard;

/// Portfolio service error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortfolioError {
    /// Fetching the account balance failed.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// No account balance has been fetched yet.
    #[error("No account data available yet")]
    NoAccountData,
}

#[derive(Debug, Clone)]
struct CachedBalance {
    balance: AccountBalance,
    fetched_at: DateTime<Utc>,
}

/// Result of one account refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshOutcome {
    /// Instrument codes currently held.
    pub codes: Vec<String>,
    /// Codes newly registered with the feed.
    pub subscribed: Vec<String>,
    /// Codes no longer held and removed from the feed.
    pub unsubscribed: Vec<String>,
}

/// Portfolio refresh and valuation service.
pub struct PortfolioService {
    account: Arc<dyn AccountPort>,
    feed: Option<Arc<dyn SubscriptionPort>>,
    board: PriceBoard,
    cached: RwLock<Option<CachedBalance>>,
    subscribed: Mutex<HashSet<String>>,
}

impl std::fmt::Debug for PortfolioService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioService")
            .field("has_feed", &self.feed.is_some())
            .field("has_data", &self.has_data())
            .finish_non_exhaustive()
    }
}

impl PortfolioService {
    /// Create a service valuing against `board`.
    #[must_use]
    pub fn new(account: Arc<dyn AccountPort>, board: PriceBoard) -> Self {
        Self {
            account,
            feed: None,
            board,
            cached: RwLock::new(None),
            subscribed: Mutex::new(HashSet::new()),
        }
    }

    /// Keep `feed` subscribed to the instruments held.
    #[must_use]
    pub fn with_feed(mut self, feed: Arc<dyn SubscriptionPort>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Fetch the account balance and update feed subscriptions.
    ///
    /// On failure the previously cached balance is kept.
    ///
    /// # Errors
    ///
    /// Returns `PortfolioError::Account` if the account source fails.
    pub async fn refresh(&self) -> Result<RefreshOutcome, PortfolioError> {
        let balance = self.account.account_balance().await?;
        let codes = balance.instrument_codes();

        tracing::info!(
            holdings = balance.holdings.len(),
            instruments = codes.len(),
            "Account balance refreshed"
        );

        *self.cached.write() = Some(CachedBalance {
            balance,
            fetched_at: Utc::now(),
        });

        let (added, removed) = {
            let mut subscribed = self.subscribed.lock();
            let held: HashSet<&String> = codes.iter().collect();
            let added: Vec<String> = codes
                .iter()
                .filter(|c| !subscribed.contains(*c))
                .cloned()
                .collect();
            let mut removed: Vec<String> = subscribed
                .iter()
                .filter(|c| !held.contains(c))
                .cloned()
                .collect();
            removed.sort();
            for code in &added {
                subscribed.insert(code.clone());
            }
            for code in &removed {
                subscribed.remove(code);
            }
            (added, removed)
        };

        if let Some(feed) = &self.feed {
            if !added.is_empty()
                && let Err(e) = feed.subscribe(added.clone()).await
            {
                tracing::warn!(error = %e, codes = ?added, "Failed to subscribe instruments");
            }
            if !removed.is_empty()
                && let Err(e) = feed.unsubscribe(removed.clone()).await
            {
                tracing::warn!(error = %e, codes = ?removed, "Failed to unsubscribe instruments");
            }
        }

        Ok(RefreshOutcome {
            codes,
            subscribed: added,
            unsubscribed: removed,
        })
    }

    /// Value the cached balance against the price board.
    ///
    /// # Errors
    ///
    /// Returns `PortfolioError::NoAccountData` before the first successful
    /// refresh.
    pub fn snapshot(&self, live_feed: bool) -> Result<PortfolioSnapshot, PortfolioError> {
        let cached = self.cached.read();
        let cached = cached.as_ref().ok_or(PortfolioError::NoAccountData)?;
        Ok(PortfolioSnapshot::compute(
            &cached.balance,
            &self.board,
            live_feed,
        ))
    }

    /// Whether a balance has been fetched.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.cached.read().is_some()
    }

    /// When the cached balance was fetched.
    #[must_use]
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.cached.read().as_ref().map(|c| c.fetched_at)
    }

    /// Number of instruments currently registered with the feed.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.subscribed.lock().len()
    }

    /// Refresh every `interval` until cancelled.
    ///
    /// Failures are logged and the stale balance is kept.
    pub async fn run_refresh_loop(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Portfolio refresh loop shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Account refresh failed, keeping cached balance");
                    }
                }
            }
        }
    }
}
