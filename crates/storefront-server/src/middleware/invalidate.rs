//! Write-triggered cache invalidation.
//!
//! Applied as a route layer on mutating routes. After the wrapped handler
//! returns a 2xx response, every configured pattern is purged from the
//! hybrid cache fire-and-forget. Non-2xx responses skip invalidation: the
//! write did not commit, so cached reads are still valid.
//!
//! ## Pattern registry
//!
//! Patterns are path prefixes in the same format the key generator uses
//! (`/api/products`, `/api/products?{"page":["1"]}`, ...), so a resource's
//! patterns structurally cover every cached query variant of its routes.
//! Over-broad patterns cost extra cache churn; that is accepted in exchange
//! for never leaving a stale listing behind.

use std::sync::Arc;

use axum::{extract::Request, middleware::Next, response::Response};

use storefront_cache::{HybridCache, KeyPattern};

/// Invalidation patterns for product mutations: covers the product listing
/// (with any pagination) and every individual product entry.
pub fn product_patterns() -> Vec<KeyPattern> {
    vec![KeyPattern::Prefix("/api/products".to_string())]
}

/// Invalidation patterns for category mutations.
pub fn category_patterns() -> Vec<KeyPattern> {
    vec![KeyPattern::Prefix("/api/categories".to_string())]
}

/// Per-user cart pattern derived from a cart route path
/// (`/api/cart/{user}` or `/api/cart/{user}/items`). One user's write never
/// purges another user's cached cart.
pub fn cart_patterns_for_path(path: &str) -> Vec<KeyPattern> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some("api"), Some("cart"), Some(user)) if !user.is_empty() => {
            vec![KeyPattern::Prefix(format!("/api/cart/{user}"))]
        }
        _ => Vec::new(),
    }
}

/// Purge the configured patterns after a successful write.
pub async fn invalidate_on_write(
    cache: Arc<HybridCache>,
    patterns: Arc<Vec<KeyPattern>>,
    req: Request,
    next: Next,
) -> Response {
    let response = next.run(req).await;

    if response.status().is_success() {
        // Fire-and-forget: invalidation never delays the reply.
        tokio::spawn(async move {
            for pattern in patterns.iter() {
                let removed = cache.delete_pattern(pattern).await;
                tracing::debug!(pattern = %pattern, removed, "invalidated after write");
            }
        });
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_cache::request_cache_key;

    #[test]
    fn product_patterns_cover_generated_keys() {
        let patterns = product_patterns();
        let keys = [
            request_cache_key("/api/products", None),
            request_cache_key("/api/products", Some("page=1&limit=20")),
            request_cache_key("/api/products/42", None),
        ];
        for key in &keys {
            assert!(
                patterns.iter().any(|p| p.matches(key)),
                "pattern registry misses key {key}"
            );
        }
    }

    #[test]
    fn category_patterns_do_not_touch_products() {
        let patterns = category_patterns();
        let product_key = request_cache_key("/api/products", Some("page=1"));
        assert!(!patterns.iter().any(|p| p.matches(&product_key)));
    }

    #[test]
    fn cart_patterns_are_scoped_per_user() {
        let patterns = cart_patterns_for_path("/api/cart/alice/items");
        assert_eq!(
            patterns,
            vec![KeyPattern::Prefix("/api/cart/alice".to_string())]
        );

        let alice_key = request_cache_key("/api/cart/alice", None);
        let bob_key = request_cache_key("/api/cart/bob", None);
        assert!(patterns.iter().any(|p| p.matches(&alice_key)));
        assert!(!patterns.iter().any(|p| p.matches(&bob_key)));
    }

    #[test]
    fn malformed_cart_path_yields_no_patterns() {
        assert!(cart_patterns_for_path("/api/cart").is_empty());
        assert!(cart_patterns_for_path("/other").is_empty());
    }
}
