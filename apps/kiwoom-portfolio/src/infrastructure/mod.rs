//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Kiwoom REST and realtime WebSocket adapters.
pub mod kiwoom;

/// Configuration loading.
pub mod config;

/// Status HTTP endpoint (health, metrics, portfolio).
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
