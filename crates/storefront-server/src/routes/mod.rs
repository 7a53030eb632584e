pub mod cart;
pub mod categories;
pub mod products;
pub mod system;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::server::AppState;

/// Assemble the full route table. Sub-routers register absolute paths so
/// the cache middleware always sees the real request path when deriving
/// cache keys.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(system::router(state.clone()))
        .merge(products::router(state.clone()))
        .merge(categories::router(state.clone()))
        .merge(cart::router(state))
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
