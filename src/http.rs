//! Operations HTTP surface: health, counters, and cached catalog reads.

use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::catalog::{CachingCatalogView, CatalogStore, ListQuery, DEFAULT_PAGE_SIZE};
use crate::domain::CatalogItem;
use crate::inventory::SyncMetrics;

pub struct AppState<S> {
    pub catalog: Arc<CachingCatalogView<S>>,
    pub metrics: Arc<dyn SyncMetrics>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self { Self { catalog: self.catalog.clone(), metrics: self.metrics.clone() } }
}

pub fn router<S: CatalogStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-inventory-sync"})) }))
        .route("/metrics", get(metrics_snapshot::<S>))
        .route("/api/v1/products", get(list_products::<S>))
        .route("/api/v1/products/:id", get(get_product::<S>))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetricsSnapshot { pub events_processed: u64, pub stock_update_errors: u64 }

async fn metrics_snapshot<S: CatalogStore + 'static>(State(s): State<AppState<S>>) -> Json<MetricsSnapshot> {
    Json(MetricsSnapshot { events_processed: s.metrics.events_processed(), stock_update_errors: s.metrics.stock_update_errors() })
}

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub category: Option<String> }
#[derive(Debug, Serialize, Deserialize)] pub struct PaginatedResponse<T> { pub data: Vec<T>, pub total: u64, pub page: u32 }

async fn list_products<S: CatalogStore + 'static>(State(s): State<AppState<S>>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<CatalogItem>>, (StatusCode, String)> {
    let query = ListQuery::new(p.category.unwrap_or_default(), p.page.unwrap_or(1), p.per_page.unwrap_or(DEFAULT_PAGE_SIZE));
    let page = s.catalog.list(&query).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(PaginatedResponse { data: page.items, total: page.total, page: query.page }))
}

async fn get_product<S: CatalogStore + 'static>(State(s): State<AppState<S>>, Path(id): Path<String>) -> Result<Json<CatalogItem>, (StatusCode, String)> {
    s.catalog.get(&id).await.map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?.map(Json).ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}
