//! Application setup and server configuration.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use axum::{extract::Extension, http::Method, routing::get, Router};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use wabridge::{BridgeClient, BridgeOptions};

use crate::config::Config;
use crate::domains::pairing::{PairingProfile, ReconnectPolicy, SessionStore};
use crate::kernel::{BridgeAdapter, ServerDeps};
use crate::server::routes::{health_handler, pair_handler};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<ServerDeps>,
}

/// Build production dependencies from configuration
pub fn build_deps(config: &Config) -> Result<ServerDeps> {
    let profile = PairingProfile::by_name(&config.pairing_profile)
        .ok_or_else(|| anyhow!("Unknown PAIRING_PROFILE: {}", config.pairing_profile))?
        .with_delays(config.pairing_code_delay, config.handoff_flush_delay);

    let bridge = BridgeClient::new(BridgeOptions {
        version_url: config.protocol_version_url.clone(),
        ..BridgeOptions::new(config.bridge_gateway_url.clone())
    });

    Ok(ServerDeps::new(
        Arc::new(BridgeAdapter::new(Arc::new(bridge))),
        SessionStore::new(config.session_root.clone()),
        profile,
        ReconnectPolicy {
            max_reconnects: config.max_reconnects,
            backoff_base: config.reconnect_backoff,
        },
        config.response_timeout,
    ))
}

/// Routes plus shared state, CORS and tracing. No rate limiting, so tests can
/// drive it without client addresses.
pub fn build_router(deps: Arc<ServerDeps>) -> Router {
    let app_state = AppState { deps };

    // CORS configuration - the pairing page may be hosted anywhere
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/", get(pair_handler))
        .route("/pair", get(pair_handler))
        .route("/health", get(health_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(Extension(app_state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Build the Axum application router
///
/// Every pairing request opens a backend connection, so requests are rate
/// limited per client IP. The client IP comes from `X-Forwarded-For`,
/// `X-Real-IP` or `Forwarded` when a proxy sets them, else the peer address.
pub fn build_app(config: &Config) -> Result<Router> {
    let deps = Arc::new(build_deps(config)?);

    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .use_headers() // x-ratelimit-* response headers
            .finish()
            .ok_or_else(|| anyhow!("Rate limits must be greater than zero"))?,
    );

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config,
    };

    Ok(build_router(deps).layer(rate_limit_layer))
}
