//! Category routes. The category tree changes rarely, so reads sit on the
//! long TTL tier.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde_json::json;
use uuid::Uuid;

use storefront_cache::TtlTier;

use crate::middleware::{invalidate, invalidate_on_write, response_cache};
use crate::server::AppState;
use crate::store::NewCategory;

use super::error_response;

pub fn router(state: AppState) -> Router {
    let cache = state.cache.clone();

    let reads = Router::new()
        .route("/api/categories", get(list_categories))
        .route("/api/categories/{id}", get(get_category))
        .route_layer(middleware::from_fn({
            let cache = cache.clone();
            move |req: Request, next: Next| {
                let cache = cache.clone();
                async move { response_cache(cache, TtlTier::Long, req, next).await }
            }
        }));

    let patterns = Arc::new(invalidate::category_patterns());
    let writes = Router::new()
        .route("/api/categories", post(create_category))
        .route("/api/categories/{id}", delete(delete_category))
        .route_layer(middleware::from_fn({
            move |req: Request, next: Next| {
                let cache = cache.clone();
                let patterns = patterns.clone();
                async move { invalidate_on_write(cache, patterns, req, next).await }
            }
        }));

    reads.merge(writes).with_state(state)
}

async fn list_categories(State(state): State<AppState>) -> Response {
    let categories = state.catalog.list_categories();
    Json(json!({ "data": categories })).into_response()
}

async fn get_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.catalog.get_category(id) {
        Some(category) => Json(category).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "category not found"),
    }
}

async fn create_category(
    State(state): State<AppState>,
    Json(new): Json<NewCategory>,
) -> Response {
    if new.name.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty");
    }
    let category = state.catalog.insert_category(new);
    tracing::info!(category_id = %category.id, "category created");
    (StatusCode::CREATED, Json(category)).into_response()
}

async fn delete_category(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.catalog.remove_category(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "category not found")
    }
}
