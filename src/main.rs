use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use gold_ticker::api::{create_api_router, ApiState};
use gold_ticker::broadcast::{BroadcastHub, ChangeSignal, SubscriberSession};
use gold_ticker::config::{
    Config, BROADCAST_CHANNEL_SIZE, QUOTE_HISTORY_CAPACITY, RATE_HISTORY_CAPACITY,
    SEEN_SET_CAPACITY,
};
use gold_ticker::feed::{
    run_quote_poller, run_rate_poller, GoogleFinanceClient, RateGate, TreasuryClient,
};
use gold_ticker::store::{BoundedHistory, InfoRegister};

const SHUTDOWN_GRACE_MS: u64 = 500;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize the logger before reading configuration so warnings about
    // invalid env overrides are visible.
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();
    config.log_config();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e.into());
    }

    // Shared pipeline state: one change signal coalesces all three sources.
    let changed = ChangeSignal::new();
    let rate_history = BoundedHistory::new(RATE_HISTORY_CAPACITY);
    let quote_history = BoundedHistory::new(QUOTE_HISTORY_CAPACITY);
    let info = InfoRegister::new(changed.clone());

    let hub = Arc::new(BroadcastHub::new(
        rate_history.clone(),
        quote_history.clone(),
        info.clone(),
        changed.clone(),
        BROADCAST_CHANNEL_SIZE,
    ));

    // Background tasks: dispatcher + the two pollers.
    let dispatcher = tokio::spawn(hub.clone().run());

    let rate_fetcher = Arc::new(TreasuryClient::new(config.rate_fetch_timeout_secs));
    let rate_poller = tokio::spawn(run_rate_poller(
        rate_fetcher,
        rate_history,
        RateGate::new(SEEN_SET_CAPACITY),
        changed.clone(),
        Duration::from_millis(config.rate_poll_interval_ms),
    ));

    let quote_fetcher = Arc::new(GoogleFinanceClient::new(config.quote_fetch_timeout_secs));
    let quote_poller = tokio::spawn(run_quote_poller(
        quote_fetcher,
        quote_history,
        changed.clone(),
        Duration::from_secs(config.quote_poll_interval_secs),
    ));

    // HTTP API server (dashboard, status admin, diagnostics)
    let api_state = ApiState {
        hub: hub.clone(),
        info,
    };
    let api_router = create_api_router(api_state).layer(CorsLayer::permissive());
    let api_listener = TcpListener::bind(&config.api_bind_address).await?;
    info!("🌐 HTTP API server running at http://{}", config.api_bind_address);
    let api_server = axum::serve(api_listener, api_router).into_future();

    // WebSocket server
    let ws_listener = TcpListener::bind(&config.bind_address).await?;
    info!("🚀 WebSocket server running at ws://{}/ws", config.bind_address);

    let ws_hub = hub.clone();
    let websocket_server = async move {
        while let Ok((stream, addr)) = ws_listener.accept().await {
            let session = SubscriberSession::new(ws_hub.clone(), addr.to_string());
            tokio::spawn(session.run(stream));
        }
    };

    info!("🎯 Starting WebSocket and HTTP API servers...");
    tokio::select! {
        result = api_server => {
            error!("API server stopped: {:?}", result);
        }
        _ = websocket_server => {
            error!("WebSocket server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown requested");
        }
    }

    // Graceful drain: the listeners closed when the select dropped their
    // server futures; cancel producers and the dispatcher, ask live sessions
    // to close their sockets, and wait briefly for them to deregister.
    rate_poller.abort();
    quote_poller.abort();
    dispatcher.abort();
    hub.shutdown();

    let drain = tokio::time::sleep(Duration::from_millis(SHUTDOWN_GRACE_MS));
    let joined = async {
        let _ = rate_poller.await;
        let _ = quote_poller.await;
        let _ = dispatcher.await;
        while hub.registry().count() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::select! {
        _ = joined => {}
        _ = drain => {
            warn!("Shutdown drain window elapsed, abandoning remaining tasks");
        }
    }

    info!("✅ Application stopped");
    Ok(())
}
