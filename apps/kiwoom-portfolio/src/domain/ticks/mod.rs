//! Latest-Price Board
//!
//! Holds at most one tick per instrument, overwritten in arrival order.
//! The board is split into a single [`PriceBoardWriter`] owned by the
//! streaming task and any number of cloneable [`PriceBoard`] readers used by
//! the portfolio layer. Readers tolerate stale values; there is no
//! cross-instrument atomicity.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

/// A single price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tick {
    /// Instrument code (six-digit stock code).
    pub code: String,
    /// Last trade price. Always positive once on the board.
    pub price: Decimal,
    /// When the receiver observed the tick.
    pub observed_at: DateTime<Utc>,
}

impl Tick {
    /// Create a tick observed now.
    #[must_use]
    pub fn now(code: impl Into<String>, price: Decimal) -> Self {
        Self {
            code: code.into(),
            price,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default)]
struct BoardInner {
    ticks: RwLock<HashMap<String, Tick>>,
    updates: AtomicU64,
    last_update: RwLock<Option<DateTime<Utc>>>,
}

/// Create a new empty price board.
///
/// Returns the only writer and a reader that can be cloned freely.
#[must_use]
pub fn price_board() -> (PriceBoardWriter, PriceBoard) {
    let inner = Arc::new(BoardInner::default());
    (
        PriceBoardWriter {
            inner: Arc::clone(&inner),
        },
        PriceBoard { inner },
    )
}

/// Write handle for the price board. Not `Clone`: there is one writer.
#[derive(Debug)]
pub struct PriceBoardWriter {
    inner: Arc<BoardInner>,
}

impl PriceBoardWriter {
    /// Record a tick, replacing any previous tick for the same instrument.
    ///
    /// Ticks with a non-positive price are ignored. Returns whether the tick
    /// was recorded.
    pub fn record(&self, tick: Tick) -> bool {
        if tick.price <= Decimal::ZERO {
            return false;
        }

        let observed_at = tick.observed_at;
        self.inner.ticks.write().insert(tick.code.clone(), tick);
        self.inner.updates.fetch_add(1, Ordering::Relaxed);
        *self.inner.last_update.write() = Some(observed_at);
        true
    }

    /// Reader view over the same board.
    #[must_use]
    pub fn reader(&self) -> PriceBoard {
        PriceBoard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read handle for the price board.
#[derive(Debug, Clone)]
pub struct PriceBoard {
    inner: Arc<BoardInner>,
}

impl PriceBoard {
    /// Latest tick for an instrument.
    #[must_use]
    pub fn latest(&self, code: &str) -> Option<Tick> {
        self.inner.ticks.read().get(code).cloned()
    }

    /// Latest price for an instrument.
    #[must_use]
    pub fn price(&self, code: &str) -> Option<Decimal> {
        self.inner.ticks.read().get(code).map(|t| t.price)
    }

    /// Copy of every instrument's latest tick.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, Tick> {
        self.inner.ticks.read().clone()
    }

    /// Number of instruments on the board.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.ticks.read().len()
    }

    /// Whether no tick has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.ticks.read().is_empty()
    }

    /// Total number of ticks recorded since start.
    #[must_use]
    pub fn update_count(&self) -> u64 {
        self.inner.updates.load(Ordering::Relaxed)
    }

    /// Observation time of the most recent tick.
    #[must_use]
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_update.read()
    }
}
