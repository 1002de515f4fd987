#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Kiwoom Portfolio - Account Holdings and Realtime Prices
//!
//! Fetches account holdings from the Kiwoom Securities REST API, keeps a
//! latest-price board current from the realtime WebSocket feed, and values
//! the portfolio by merging both.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `holdings`: Account summary and holding records
//!   - `ticks`: Ticks and the single-writer price board
//!   - `portfolio`: Valuation and totals
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Account source and feed subscription interfaces
//!   - `services`: Portfolio refresh and snapshot
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `kiwoom`: REST pagination client and realtime tick receiver
//!   - `config`: Environment configuration
//!   - `health`: Status HTTP endpoint
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! Kiwoom REST ──kt00018──► PortfolioService ──codes──► TickReceiver ◄── Kiwoom WS
//!                               │                            │
//!                               │ snapshot()                 │ record()
//!                               ▼                            ▼
//!                        PortfolioSnapshot ◄──── latest ─── PriceBoard
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::holdings::{AccountBalance, AccountSummary, HoldingRecord};
pub use domain::portfolio::{HoldingValuation, PortfolioSnapshot, PortfolioTotals, PriceSource};
pub use domain::ticks::{PriceBoard, PriceBoardWriter, Tick, price_board};

// Application
pub use application::ports::{AccountError, AccountPort, SubscriptionError, SubscriptionPort};
pub use application::services::{PortfolioError, PortfolioService, RefreshOutcome};

// Infrastructure config
pub use infrastructure::config::{
    AppConfig, ConfigError, Credentials, KiwoomEnvironment, RestSettings, ServerSettings,
    StreamSettings,
};

// Kiwoom clients
pub use infrastructure::kiwoom::{
    AccessToken, Continuation, KiwoomError, KiwoomHttpClient, StreamEvent, StreamState,
    TickReceiver, TickReceiverConfig, TickReceiverHandle, TrClient, TransactionId,
};

// Status server
pub use infrastructure::health::{FeedState, StatusServer, StatusServerError, StatusServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
