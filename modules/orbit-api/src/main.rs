use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use category_client::ClaudeOracle;
use orbit_common::Config;
use orbit_graph::{Aggregator, Classifier};
use orbit_store::{DocumentStore, PgBackend};

mod rest;

pub struct AppState {
    pub aggregator: Aggregator,
    pub store: Arc<DocumentStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("orbit=info".parse()?))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    let backend = PgBackend::new(pool);
    backend.migrate().await?;

    let store = Arc::new(DocumentStore::with_ttl(
        Arc::new(backend),
        Duration::from_secs(config.cache_ttl_seconds),
    ));

    let oracle = Arc::new(ClaudeOracle::new(
        &config.anthropic_api_key,
        &config.oracle_model,
    ));
    let classifier = Arc::new(Classifier::with_budget(
        store.clone(),
        oracle,
        config.label_budget,
    ));

    let state = Arc::new(AppState {
        aggregator: Aggregator::new(store.clone(), classifier),
        store,
    });

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/api/visit", post(rest::api_visit))
        .route("/api/ranked", get(rest::api_ranked))
        .route("/api/graph", get(rest::api_graph))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!(addr, "Orbit API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
