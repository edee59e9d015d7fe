use axum::{
    Router,
    routing::{any, get, post},
};
use http::HeaderValue;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::compression::CompressionLevel;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::error::{ConfigError, Result as AppResult};
use crate::state::AppState;

pub mod error;
pub mod handlers;
pub mod ws;

pub use self::error::WebError;

const RATE_LIMIT_PER_MS: u64 = 500;
const RATE_LIMIT_BURST: u32 = 30;
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Parses configured origins, skipping the ones that are not valid header values.
fn allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(cors.origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins = allowed_origins(origins);
    if origins.is_empty() {
        tracing::info!("Restrictive CORS policy applied (no origins configured)");
        return CorsLayer::new();
    }
    tracing::info!(cors.origins.count = origins.len(), "CORS configured");
    CorsLayer::new()
        .allow_methods([http::Method::GET, http::Method::POST])
        .allow_origin(origins)
        .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT])
}

fn build_router(app_state: AppState, server_config: &ServerConfig) -> AppResult<Router> {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(RATE_LIMIT_PER_MS)
            .burst_size(RATE_LIMIT_BURST)
            .finish()
            .ok_or_else(|| ConfigError::InvalidValue("rate limiter settings".to_string()))?,
    );

    // Per-IP buckets accumulate; sweep stale ones.
    let limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LIMITER_SWEEP_INTERVAL).await;
            limiter.retain_recent();
            tracing::trace!(rate_limiter.storage_size = limiter.len(), "Swept rate limiter");
        }
    });

    Ok(Router::new()
        .route("/api/sessions", get(handlers::list_sessions_handler))
        .route(
            "/api/sessions/{channel}",
            post(handlers::start_session_handler).get(handlers::get_session_handler),
        )
        .route("/ws", any(ws::ws_handler))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CompressionLayer::new()
                .quality(CompressionLevel::Default)
                .gzip(true),
        )
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors_layer(&server_config.cors_origins)))
}

#[tracing::instrument(skip(app_state, server_config), fields(
    server.port = server_config.port
))]
pub async fn run_server(app_state: AppState, server_config: ServerConfig) -> AppResult<()> {
    let app = build_router(app_state, &server_config)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    tracing::info!(server.address = %addr, "HTTP server starting");

    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(Into::into)
}
