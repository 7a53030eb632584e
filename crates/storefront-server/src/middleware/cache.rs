//! Read-through response caching middleware.
//!
//! Applied as a route layer on idempotent GET routes. On a hit the cached
//! JSON body is written straight to the client and the handler never runs;
//! on a miss the handler's response is buffered and, for 2xx statuses only,
//! stored in the hybrid cache without delaying the reply.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

use storefront_cache::{HybridCache, TtlTier, request_cache_key};

const X_CACHE: &str = "x-cache";

/// Cache-aware wrapper around a GET route.
///
/// Wire it up with `axum::middleware::from_fn`:
///
/// ```ignore
/// .route_layer(middleware::from_fn({
///     let cache = state.cache.clone();
///     move |req: Request, next: Next| {
///         let cache = cache.clone();
///         async move { response_cache(cache, TtlTier::Medium, req, next).await }
///     }
/// }))
/// ```
pub async fn response_cache(
    cache: Arc<HybridCache>,
    tier: TtlTier,
    req: Request,
    next: Next,
) -> Response {
    // Only safe, idempotent reads are ever cached.
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let key = request_cache_key(req.uri().path(), req.uri().query());

    if let Some(cached) = cache.get(&key).await {
        // A corrupt entry reads as a miss; drop it so it cannot be served
        // again.
        if serde_json::from_slice::<serde_json::Value>(&cached).is_ok() {
            tracing::debug!(key = %key, tier = %tier, "response cache hit");
            return cached_response(&cached);
        }
        tracing::warn!(key = %key, "cached response is not valid JSON, evicting");
        cache.delete(&key).await;
    }

    let response = next.run(req).await;
    let (parts, body) = response.into_parts();

    if !parts.status.is_success() {
        // Errors, validation failures and not-found are never cached.
        return Response::from_parts(parts, body);
    }

    let is_json = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if !is_json {
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            // The handler's body stream failed mid-flight; nothing left to
            // forward.
            tracing::error!(key = %key, error = %e, "failed to buffer response body");
            let mut failed = Response::new(Body::empty());
            *failed.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            return failed;
        }
    };

    // Fire-and-forget store: the client response must not wait on cache IO.
    {
        let cache = Arc::clone(&cache);
        let key = key.clone();
        let data = bytes.to_vec();
        tokio::spawn(async move {
            cache.set(&key, data, tier.duration()).await;
        });
    }

    let mut response = Response::from_parts(parts, Body::from(bytes));
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("miss"));
    response
}

fn cached_response(body: &Arc<Vec<u8>>) -> Response {
    let mut response = Response::new(Body::from(body.as_ref().clone()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("hit"));
    response
}
