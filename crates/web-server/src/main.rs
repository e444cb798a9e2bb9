use anyhow::Context;
use api_client::CftcClient;
use database::PgReportStore;
use engine::PositioningEngine;
use std::net::SocketAddr;
use std::sync::Arc;

// This main function is the entry point when running `cargo run -p web-server`.
// It wires a Postgres-backed engine and hands it to `run_server`.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = configuration::load_config().context("Failed to load configuration")?;
    let _log_guard = configuration::init_tracing(&config.logging)?;

    let db_pool = database::connect().await?;
    database::run_migrations(&db_pool).await?;
    let store = Arc::new(PgReportStore::new(db_pool));
    let source = Arc::new(CftcClient::new(&config.upstream)?);
    let engine = Arc::new(PositioningEngine::new(&config, store, source)?);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    web_server::run_server(addr, engine, config.cache.ttl).await
}
