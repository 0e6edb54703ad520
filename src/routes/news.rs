use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::services::metrics::MetricsSnapshot;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(query_news))
        .route("/collect", post(collect_news))
        .route("/stats", get(pipeline_stats))
}

#[derive(Debug, Deserialize)]
pub struct CollectRequest {
    pub symbols: Vec<String>,
    /// Defaults to the day before `to`
    pub from: Option<NaiveDate>,
    /// Defaults to today
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub symbols: usize,
    pub enqueued: usize,
}

/// Trigger ingestion for one or more symbols. Returns once the raw records
/// are enqueued; enrichment and persistence run in the background.
async fn collect_news(
    State(state): State<AppState>,
    Json(request): Json<CollectRequest>,
) -> Result<Json<CollectResponse>, AppError> {
    if request.symbols.is_empty() {
        return Err(AppError::Validation("symbols must not be empty".to_string()));
    }

    let to_date = request.to.unwrap_or_else(|| Utc::now().date_naive());
    let from_date = request.from.unwrap_or(to_date - Duration::days(1));
    if from_date > to_date {
        return Err(AppError::Validation("from must not be after to".to_string()));
    }

    info!(
        "POST /api/news/collect - {} symbols, {} to {}",
        request.symbols.len(),
        from_date,
        to_date
    );

    let enqueued = state
        .pipeline
        .ingest_symbols(&request.symbols, from_date, to_date)
        .await;

    Ok(Json(CollectResponse {
        symbols: request.symbols.len(),
        enqueued,
    }))
}

#[derive(Debug, Deserialize)]
pub struct NewsQueryParams {
    pub symbol: String,
    /// Window start, unix seconds (inclusive)
    pub from: i64,
    /// Window end, unix seconds (inclusive)
    pub to: i64,
    pub min_importance: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct NewsQueryResponse {
    pub count: usize,
    pub items: Vec<serde_json::Value>,
}

/// Range query over one symbol's news partition
async fn query_news(
    State(state): State<AppState>,
    Query(params): Query<NewsQueryParams>,
) -> Result<Json<NewsQueryResponse>, AppError> {
    if params.from > params.to {
        return Err(AppError::Validation("from must not be after to".to_string()));
    }

    let records = state
        .store
        .query_range(&params.symbol, params.from, params.to, params.min_importance)
        .await?;

    Ok(Json(NewsQueryResponse {
        count: records.len(),
        items: records.into_iter().map(|record| record.payload).collect(),
    }))
}

async fn pipeline_stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.pipeline.metrics().snapshot())
}
