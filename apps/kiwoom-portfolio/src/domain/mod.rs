//! Domain Layer - Account, tick, and valuation types.
//!
//! This layer contains the core domain types with no I/O. Everything
//! here is pure Rust with serialization support.

/// Account balance and per-instrument holdings.
pub mod holdings;

/// Latest-price board fed by the realtime tick stream.
pub mod ticks;

/// Portfolio valuation merging holdings with live prices.
pub mod portfolio;
