//! Per-user cart routes.
//!
//! Cart contents are volatile, so reads use the short TTL tier, and
//! invalidation is scoped to the user whose cart changed: the pattern is
//! derived from the request path at invalidation time rather than
//! registered statically.

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use std::sync::Arc;

use storefront_cache::TtlTier;

use crate::middleware::{invalidate, invalidate_on_write, response_cache};
use crate::server::AppState;
use crate::store::CartItem;

pub fn router(state: AppState) -> Router {
    let cache = state.cache.clone();

    let reads = Router::new()
        .route("/api/cart/{user}", get(get_cart))
        .route_layer(middleware::from_fn({
            let cache = cache.clone();
            move |req: Request, next: Next| {
                let cache = cache.clone();
                async move { response_cache(cache, TtlTier::Short, req, next).await }
            }
        }));

    let writes = Router::new()
        .route("/api/cart/{user}/items", post(add_item))
        .route("/api/cart/{user}", delete(clear_cart))
        .route_layer(middleware::from_fn({
            move |req: Request, next: Next| {
                let cache = cache.clone();
                let patterns =
                    Arc::new(invalidate::cart_patterns_for_path(req.uri().path()));
                async move { invalidate_on_write(cache, patterns, req, next).await }
            }
        }));

    reads.merge(writes).with_state(state)
}

async fn get_cart(State(state): State<AppState>, Path(user): Path<String>) -> Response {
    Json(state.catalog.get_cart(&user)).into_response()
}

async fn add_item(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(item): Json<CartItem>,
) -> Response {
    if item.quantity == 0 {
        return super::error_response(StatusCode::UNPROCESSABLE_ENTITY, "quantity must be > 0");
    }
    let cart = state.catalog.add_cart_item(&user, item);
    (StatusCode::CREATED, Json(cart)).into_response()
}

async fn clear_cart(State(state): State<AppState>, Path(user): Path<String>) -> Response {
    state.catalog.clear_cart(&user);
    StatusCode::NO_CONTENT.into_response()
}
