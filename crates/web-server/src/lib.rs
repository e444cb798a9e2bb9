use axum::{Router, routing::get};
use engine::PositioningEngine;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PositioningEngine>,
}

/// Builds the read-only JSON API over the engine.
pub fn router(engine: Arc<PositioningEngine>) -> Router {
    let app_state = Arc::new(AppState { engine });
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/rankings", get(handlers::get_rankings))
        .route("/api/currencies", get(handlers::get_currencies))
        .route("/api/currencies/:code/score", get(handlers::get_score))
        .route("/api/currencies/:code/reports", get(handlers::get_reports))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serves the API on `addr` until the process is stopped.
///
/// Expired cache entries are purged in the background once per TTL.
pub async fn run_server(
    addr: SocketAddr,
    engine: Arc<PositioningEngine>,
    cache_ttl: Duration,
) -> anyhow::Result<()> {
    let housekeeping = engine.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cache_ttl);
        loop {
            interval.tick().await;
            housekeeping.purge_caches().await;
        }
    });

    let app = router(engine);

    tracing::info!("Web server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
