//! Kiwoom Portfolio Binary
//!
//! Logs in to Kiwoom, starts the realtime tick receiver, refreshes the
//! account balance periodically, and serves the status endpoint.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin kiwoom-portfolio
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIWOOM_APP_KEY`: Kiwoom app key
//! - `KIWOOM_SECRET_KEY`: Kiwoom secret key
//!
//! ## Optional
//! - `KIWOOM_ENV`: MOCK | LIVE (default: MOCK)
//! - `KIWOOM_REST_HOST`, `KIWOOM_WS_URL`: endpoint overrides
//! - `KIWOOM_HTTP_TIMEOUT_SECS`: request timeout (default: 30)
//! - `KIWOOM_PAGE_DELAY_MS`: pause between pages (default: 1000)
//! - `KIWOOM_MAX_PAGES`: page limit (default: 3)
//! - `KIWOOM_ACCOUNT_REFRESH_SECS`: account refresh interval (default: 60)
//! - `KIWOOM_EXCHANGE`: exchange for the balance query (default: KRX)
//! - `KIWOOM_STREAM_TYPES`: realtime types, comma separated (default: 0B)
//! - `KIWOOM_STREAM_GROUP`: registration group (default: 1)
//! - `KIWOOM_RECONNECT_ENABLED`: reconnect the feed (default: true)
//! - `KIWOOM_RECONNECT_DELAY_INITIAL_MS` (500), `KIWOOM_RECONNECT_DELAY_MAX_SECS` (30),
//!   `KIWOOM_RECONNECT_DELAY_MULTIPLIER` (2.0), `KIWOOM_MAX_RECONNECT_ATTEMPTS` (0 = unlimited)
//! - `STATUS_PORT`: status HTTP port (default: 8083)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: kiwoom_portfolio=info)

use std::sync::Arc;

use kiwoom_portfolio::application::ports::{AccountPort, SubscriptionPort};
use kiwoom_portfolio::infrastructure::health::{FeedState, StatusServer, StatusServerState};
use kiwoom_portfolio::infrastructure::kiwoom::{
    KiwoomHttpClient, ReconnectConfig, StreamEvent, TickReceiver, TickReceiverConfig, TrClient,
};
use kiwoom_portfolio::infrastructure::telemetry;
use kiwoom_portfolio::{AppConfig, PortfolioService, init_metrics, price_board};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Kiwoom portfolio service");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, /metrics disabled");
    }

    let config = AppConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // REST session
    let http = KiwoomHttpClient::new(config.rest.host.clone(), config.rest.timeout)?;
    let client = Arc::new(TrClient::login(http, &config.credentials, config.rest.clone()).await?);

    // Realtime feed
    let (writer, board) = price_board();
    let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(EVENT_BUFFER);

    let mut receiver_config = TickReceiverConfig::new(config.stream.url.clone(), client.token().clone())
        .with_reconnect(ReconnectConfig::from_stream_settings(&config.stream));
    receiver_config.group.clone_from(&config.stream.group);
    receiver_config.types.clone_from(&config.stream.types);

    let (receiver, feed_handle) =
        TickReceiver::new(receiver_config, writer, event_tx, shutdown_token.clone());

    let feed_state = Arc::new(FeedState::new());
    let event_feed_state = Arc::clone(&feed_state);
    tokio::spawn(async move {
        handle_stream_events(event_rx, event_feed_state).await;
    });

    tokio::spawn(async move {
        if let Err(e) = receiver.run().await {
            tracing::error!(error = %e, "Tick receiver stopped, prices will go stale");
        }
    });

    // Portfolio refresh
    let account: Arc<dyn AccountPort> = client;
    let feed: Arc<dyn SubscriptionPort> = Arc::new(feed_handle);
    let service = Arc::new(PortfolioService::new(account, board.clone()).with_feed(feed));

    tokio::spawn(
        Arc::clone(&service).run_refresh_loop(config.rest.account_refresh, shutdown_token.clone()),
    );

    // Status server
    let status_state = Arc::new(StatusServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        feed_state,
        service,
        board,
    ));
    let status_server = StatusServer::new(
        config.server.status_port,
        status_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = status_server.run().await {
            tracing::error!(error = %e, "Status server error");
        }
    });

    tracing::info!("Kiwoom portfolio service ready");

    await_shutdown(shutdown_token).await;

    tracing::info!("Kiwoom portfolio service stopped");
    Ok(())
}

/// Apply receiver events to the feed state.
async fn handle_stream_events(mut rx: mpsc::Receiver<StreamEvent>, feed_state: Arc<FeedState>) {
    while let Some(event) = rx.recv().await {
        feed_state.apply(&event);
        match &event {
            StreamEvent::Authenticated => tracing::info!("Realtime feed logged in"),
            StreamEvent::Disconnected => tracing::warn!("Realtime feed disconnected"),
            StreamEvent::Reconnecting { attempt } => {
                tracing::info!(attempt, "Realtime feed reconnecting");
            }
            StreamEvent::Subscribed { codes } => {
                tracing::debug!(count = codes.len(), "Realtime subscriptions sent");
            }
            StreamEvent::Error(msg) => tracing::error!(error = %msg, "Realtime feed error"),
            StreamEvent::Connecting | StreamEvent::Streaming => {}
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &AppConfig) {
    tracing::info!(
        environment = config.environment.as_str(),
        rest_host = %config.rest.host,
        ws_url = %config.stream.url,
        max_pages = config.rest.max_pages,
        page_delay_ms = config.rest.page_delay.as_millis(),
        refresh_secs = config.rest.account_refresh.as_secs(),
        reconnect = config.stream.reconnect_enabled,
        status_port = config.server.status_port,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
