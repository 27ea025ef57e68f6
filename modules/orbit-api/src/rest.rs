use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;

use orbit_common::{slugify, TrendingTopics, TRENDING_PATH};
use orbit_graph::derive::build_graph;
use orbit_graph::stats::{DEFAULT_RANDOM_SLOTS, DEFAULT_VISIBLE};

use crate::AppState;

// --- Request shapes ---

#[derive(Deserialize)]
pub struct VisitRequest {
    pub slug: String,
    pub title: String,
}

#[derive(Deserialize)]
pub struct RankedQuery {
    n: Option<usize>,
    r: Option<usize>,
}

#[derive(Deserialize)]
pub struct GraphQuery {
    n: Option<usize>,
    r: Option<usize>,
    radius: Option<f64>,
}

// --- Handlers ---

pub async fn api_visit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VisitRequest>,
) -> impl IntoResponse {
    if req.slug.is_empty() || req.title.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "slug and title are required"})),
        );
    }

    let stats = state.aggregator.record_visit(&req.slug, &req.title).await;
    (StatusCode::OK, Json(json!(stats)))
}

pub async fn api_ranked(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankedQuery>,
) -> impl IntoResponse {
    let board = state
        .aggregator
        .ranked(
            query.n.unwrap_or(DEFAULT_VISIBLE),
            query.r.unwrap_or(DEFAULT_RANDOM_SLOTS),
        )
        .await;
    Json(board)
}

pub async fn api_graph(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GraphQuery>,
) -> impl IntoResponse {
    let board = state
        .aggregator
        .ranked(
            query.n.unwrap_or(DEFAULT_VISIBLE),
            query.r.unwrap_or(DEFAULT_RANDOM_SLOTS),
        )
        .await;

    let trending: HashSet<String> = state
        .store
        .get_as::<TrendingTopics>(TRENDING_PATH)
        .await
        .unwrap_or_default()
        .topics
        .iter()
        .map(|t| slugify(t))
        .collect();

    let radius = query.radius.unwrap_or(240.0);
    let (nodes, edges) = build_graph(&board, &trending, (0.0, 0.0), radius);

    Json(json!({ "nodes": nodes, "edges": edges }))
}
