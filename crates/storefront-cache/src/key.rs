//! Deterministic cache keys for GET requests.
//!
//! ## Key Format
//!
//! - No query parameters: the bare path, e.g. `/api/products/42`
//! - With query parameters: `{path}?{sorted-json}`, e.g.
//!   `/api/products?{"limit":["20"],"page":["1"]}`
//!
//! Query parameters are grouped by name into a sorted map before
//! serialization, so two requests that differ only in parameter order produce
//! the same key. Repeated parameters keep their order of appearance under one
//! name, so `?page=1&page=2` and `?page=2` never share a key. Because every
//! key starts with the route path, invalidation rules can be expressed as
//! path prefixes and are guaranteed to cover all cached query variants of
//! that route.

use std::collections::BTreeMap;

/// Compute the cache key for a request from its path and raw query string.
pub fn request_cache_key(path: &str, raw_query: Option<&str>) -> String {
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(q) = raw_query {
        for (k, v) in url::form_urlencoded::parse(q.as_bytes()) {
            params.entry(k.to_string()).or_default().push(v.to_string());
        }
    }

    if params.is_empty() {
        return path.to_string();
    }

    // Serializing a BTreeMap<String, Vec<String>> cannot fail.
    let canonical = serde_json::to_string(&params).unwrap_or_default();
    format!("{path}?{canonical}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_path_without_query() {
        assert_eq!(request_cache_key("/api/products", None), "/api/products");
    }

    #[test]
    fn empty_query_string_is_bare_path() {
        assert_eq!(request_cache_key("/api/products", Some("")), "/api/products");
    }

    #[test]
    fn query_order_does_not_matter() {
        let a = request_cache_key("/api/products", Some("page=1&limit=20"));
        let b = request_cache_key("/api/products", Some("limit=20&page=1"));
        assert_eq!(a, b);
        assert_eq!(a, r#"/api/products?{"limit":["20"],"page":["1"]}"#);
    }

    #[test]
    fn different_values_produce_different_keys() {
        let a = request_cache_key("/api/products", Some("page=1"));
        let b = request_cache_key("/api/products", Some("page=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn repeated_parameters_are_preserved() {
        // `?page=1&page=2` and `?page=2` reach the handler as different
        // requests; their keys must differ too.
        let a = request_cache_key("/api/products", Some("page=1&page=2"));
        let b = request_cache_key("/api/products", Some("page=2"));
        assert_ne!(a, b);
        assert_eq!(a, r#"/api/products?{"page":["1","2"]}"#);
    }

    #[test]
    fn keys_share_the_path_prefix() {
        let key = request_cache_key("/api/products", Some("page=1&limit=20"));
        assert!(key.starts_with("/api/products"));
    }

    #[test]
    fn url_encoded_values_are_decoded() {
        let key = request_cache_key("/api/products", Some("q=red%20shoes"));
        assert_eq!(key, r#"/api/products?{"q":["red shoes"]}"#);
    }
}
