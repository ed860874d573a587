//! JSON API.
//!
//! Two ranking endpoints over the orders table, recomputed from the cached
//! table on every request:
//!
//! - `GET /api/top_customers`: customer id to summed quantity, top N
//! - `GET /api/top_products`: product id to summed quantity, top N
//!
//! Keys appear in descending order of quantity. Rows without an id are left
//! out. A table without rows gives `{}`. If the table cannot be loaded the
//! response is 503; if it loads but cannot be aggregated the response is 500.

use crate::analysis;
use crate::config::Config;
use crate::error::{AggregateError, SectionError, SourceError};
use crate::source::{CachedSource, SourceLoader, TableCache, TableSource};
use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppState {
    pub source: CachedSource<SourceLoader>,
    /// Identifier of the orders table.
    pub orders: String,
    pub top_n: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let loader = SourceLoader::new(config.cache.fetch_timeout_seconds)?;

        Ok(Self {
            source: CachedSource::new(loader, TableCache::new(config.cache.ttl())),
            orders: config.server.orders_source.clone(),
            top_n: config.server.top_n,
        })
    }
}

/// Error response of the API.
#[derive(Debug)]
pub struct ApiError(SectionError);

impl From<SourceError> for ApiError {
    fn from(e: SourceError) -> Self {
        ApiError(e.into())
    }
}

impl From<AggregateError> for ApiError {
    fn from(e: AggregateError) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            SectionError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!("Request failed ({}): {}", status, self.0);
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Sum `value_column` per `key_column` and keep the top `n` as a JSON object.
///
/// Rows with a null key are dropped before grouping.
pub async fn ranking<S: TableSource>(
    source: &S,
    identifier: &str,
    key_column: &str,
    value_column: &str,
    n: usize,
) -> Result<Map<String, JsonValue>, ApiError> {
    let table = source.load(identifier).await?;
    if table.is_empty() {
        return Ok(Map::new());
    }

    let keyed = analysis::drop_nulls(&table, &[key_column])?;
    let sums = analysis::group_sum(&keyed, &[key_column], value_column)?;
    let top = analysis::top_n(&sums, n, value_column, true)?;

    let ranked = top
        .rows()
        .iter()
        .map(|row| {
            let quantity = serde_json::to_value(&row[1]).unwrap_or(JsonValue::Null);
            (row[0].to_string(), quantity)
        })
        .collect();

    Ok(ranked)
}

async fn top_customers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Map<String, JsonValue>>, ApiError> {
    let ranked = ranking(&state.source, &state.orders, "customer_id", "quantity", state.top_n).await?;
    info!("GET /api/top_customers -> {} entries", ranked.len());
    Ok(Json(ranked))
}

async fn top_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Map<String, JsonValue>>, ApiError> {
    let ranked = ranking(&state.source, &state.orders, "product_id", "quantity", state.top_n).await?;
    info!("GET /api/top_products -> {} entries", ranked.len());
    Ok(Json(ranked))
}

#[derive(Debug, Deserialize)]
struct CacheQuery {
    /// Invalidate only this source identifier.
    source: Option<String>,
}

async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CacheQuery>,
) -> StatusCode {
    let cache = state.source.cache();
    match query.source {
        Some(source) => {
            let cached = cache.invalidate(&source);
            info!("Invalidated {} (cached: {})", source, cached);
        }
        None => {
            let dropped = cache.clear();
            info!("Table cache cleared ({} tables)", dropped);
        }
    }
    if !cache.is_empty() {
        debug!("{} tables remain cached", cache.len());
    }
    StatusCode::NO_CONTENT
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/top_customers", get(top_customers))
        .route("/api/top_products", get(top_products))
        .route("/api/cache", delete(clear_cache))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    info!(
        "Serving orders from {} on http://{}",
        config.server.orders_source, config.server.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
