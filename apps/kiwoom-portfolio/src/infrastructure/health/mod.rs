//! Status Server
//!
//! HTTP endpoint for health checks, Prometheus metrics, and the computed
//! portfolio snapshot. Data only, no presentation.
//!
//! # Endpoints
//!
//! - `GET /health` - JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (checks the realtime feed)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /portfolio` - Portfolio snapshot JSON (503 before the first refresh)
//! - `POST /portfolio/refresh` - Force an account refresh

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use axum::routing::{get, post};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{PortfolioError, PortfolioService};
use crate::domain::ticks::PriceBoard;
use crate::infrastructure::kiwoom::{StreamEvent, StreamState};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Feed State
// =============================================================================

/// Realtime feed state as observed through receiver events.
#[derive(Debug, Default)]
pub struct FeedState {
    state: RwLock<StreamState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    error_message: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
}

impl FeedState {
    /// Create a disconnected feed state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one receiver event.
    pub fn apply(&self, event: &StreamEvent) {
        match event {
            StreamEvent::Reconnecting { attempt } => {
                self.reconnect_attempts.store(*attempt, Ordering::Relaxed);
            }
            StreamEvent::Error(message) => {
                *self.error_message.write() = Some(message.clone());
            }
            _ => {}
        }

        if let Some(state) = event.state() {
            self.set_state(state);
        }
    }

    /// Set the connection state.
    pub fn set_state(&self, state: StreamState) {
        *self.state.write() = state;
        if state == StreamState::Authenticated {
            *self.last_connected_at.write() = Some(Utc::now());
            self.reconnect_attempts.store(0, Ordering::Relaxed);
            *self.error_message.write() = None;
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.state.read()
    }

    /// Whether ticks are flowing.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state() == StreamState::Streaming
    }

    /// Whether the feed is logged in.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(
            self.state(),
            StreamState::Authenticated | StreamState::Streaming
        )
    }

    /// Last successful login.
    #[must_use]
    pub fn last_connected_at(&self) -> Option<DateTime<Utc>> {
        *self.last_connected_at.read()
    }

    /// Most recent non-fatal error since the last login.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error_message.read().clone()
    }

    /// Reconnect attempts since the last login.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Realtime feed status.
    pub feed: FeedInfo,
    /// Account data status.
    pub account: AccountInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Account data present and ticks flowing.
    Healthy,
    /// Account data present, realtime feed not streaming.
    Degraded,
    /// No account data.
    Unhealthy,
}

/// Realtime feed status.
#[derive(Debug, Clone, Serialize)]
pub struct FeedInfo {
    /// Connection state.
    pub state: String,
    /// Whether ticks are flowing.
    pub streaming: bool,
    /// Instruments on the price board.
    pub instruments: usize,
    /// Ticks recorded since start.
    pub ticks_received: u64,
    /// Time of the latest tick.
    pub last_tick_at: Option<DateTime<Utc>>,
    /// Reconnect attempts since the last login.
    pub reconnect_attempts: u32,
    /// Last non-fatal error.
    pub error: Option<String>,
}

/// Account data status.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    /// Whether a balance has been fetched.
    pub has_data: bool,
    /// Time of the last successful refresh.
    pub last_refresh: Option<DateTime<Utc>>,
    /// Instruments registered with the feed.
    pub subscriptions: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the status server.
#[derive(Debug)]
pub struct StatusServerState {
    version: String,
    started_at: Instant,
    feed: Arc<FeedState>,
    service: Arc<PortfolioService>,
    board: PriceBoard,
}

impl StatusServerState {
    /// Create new status server state.
    #[must_use]
    pub fn new(
        version: String,
        feed: Arc<FeedState>,
        service: Arc<PortfolioService>,
        board: PriceBoard,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            feed,
            service,
            board,
        }
    }
}

/// Build the status router.
pub fn router(state: Arc<StatusServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .route("/portfolio", get(portfolio_handler))
        .route("/portfolio/refresh", post(refresh_handler))
        .with_state(state)
}

// =============================================================================
// Status Server
// =============================================================================

/// Status HTTP server.
#[derive(Debug)]
pub struct StatusServer {
    port: u16,
    state: Arc<StatusServerState>,
    cancel: CancellationToken,
}

impl StatusServer {
    /// Create a new status server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<StatusServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the status server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `StatusServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), StatusServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| StatusServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Status server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| StatusServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<StatusServerState>>) -> impl IntoResponse {
    if state.feed.is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

async fn portfolio_handler(State(state): State<Arc<StatusServerState>>) -> axum::response::Response {
    match state.service.snapshot(state.feed.is_streaming()) {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn refresh_handler(State(state): State<Arc<StatusServerState>>) -> axum::response::Response {
    match state.service.refresh().await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Manual account refresh failed");
            error_response(&e)
        }
    }
}

fn error_response(error: &PortfolioError) -> axum::response::Response {
    let status = match error {
        PortfolioError::NoAccountData => StatusCode::SERVICE_UNAVAILABLE,
        PortfolioError::Account(_) => StatusCode::BAD_GATEWAY,
    };
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn build_health_response(state: &StatusServerState) -> HealthResponse {
    let feed_state = state.feed.state();
    let feed = FeedInfo {
        state: feed_state.as_str().to_string(),
        streaming: feed_state == StreamState::Streaming,
        instruments: state.board.len(),
        ticks_received: state.board.update_count(),
        last_tick_at: state.board.last_update(),
        reconnect_attempts: state.feed.reconnect_attempts(),
        error: state.feed.error_message(),
    };
    let account = AccountInfo {
        has_data: state.service.has_data(),
        last_refresh: state.service.last_refresh(),
        subscriptions: state.service.subscription_count(),
    };

    HealthResponse {
        status: determine_health_status(&feed, &account),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        feed,
        account,
    }
}

const fn determine_health_status(feed: &FeedInfo, account: &AccountInfo) -> HealthStatus {
    match (account.has_data, feed.streaming) {
        (true, true) => HealthStatus::Healthy,
        (true, false) => HealthStatus::Degraded,
        (false, _) => HealthStatus::Unhealthy,
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Status server errors.
#[derive(Debug, thiserror::Error)]
pub enum StatusServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================
