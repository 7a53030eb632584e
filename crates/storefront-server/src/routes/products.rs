//! Product catalog routes.
//!
//! Reads are cached on the medium TTL tier; every mutation purges the
//! product key space.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use storefront_cache::TtlTier;

use crate::middleware::{invalidate, invalidate_on_write, response_cache};
use crate::server::AppState;
use crate::store::{NewProduct, ProductUpdate};

use super::error_response;

pub fn router(state: AppState) -> Router {
    let cache = state.cache.clone();

    let reads = Router::new()
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route_layer(middleware::from_fn({
            let cache = cache.clone();
            move |req: Request, next: Next| {
                let cache = cache.clone();
                async move { response_cache(cache, TtlTier::Medium, req, next).await }
            }
        }));

    let patterns = Arc::new(invalidate::product_patterns());
    let writes = Router::new()
        .route("/api/products", post(create_product))
        .route(
            "/api/products/{id}",
            put(update_product).delete(delete_product),
        )
        .route_layer(middleware::from_fn({
            move |req: Request, next: Next| {
                let cache = cache.clone();
                let patterns = patterns.clone();
                async move { invalidate_on_write(cache, patterns, req, next).await }
            }
        }));

    reads.merge(writes).with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<usize>,
    limit: Option<usize>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(20);
    let (products, total) = state.catalog.list_products(page, limit);
    Json(json!({
        "data": products,
        "pagination": { "page": page, "limit": limit, "total": total }
    }))
    .into_response()
}

async fn get_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.catalog.get_product(id) {
        Some(product) => Json(product).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "product not found"),
    }
}

async fn create_product(
    State(state): State<AppState>,
    Json(new): Json<NewProduct>,
) -> Response {
    if new.name.trim().is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "name must not be empty");
    }
    if new.price_cents < 0 {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "price must not be negative");
    }
    let product = state.catalog.insert_product(new);
    tracing::info!(product_id = %product.id, "product created");
    (StatusCode::CREATED, Json(product)).into_response()
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<ProductUpdate>,
) -> Response {
    if update.price_cents.is_some_and(|p| p < 0) {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "price must not be negative");
    }
    match state.catalog.update_product(id, update) {
        Some(product) => Json(product).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "product not found"),
    }
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    if state.catalog.remove_product(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "product not found")
    }
}
