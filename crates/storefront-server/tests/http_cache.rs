use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use storefront_cache::HybridCache;
use storefront_server::store::Catalog;
use storefront_server::{AppState, build_app};
use tokio::task::JoinHandle;

struct TestServer {
    base: String,
    catalog: Arc<Catalog>,
    cache: Arc<HybridCache>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

async fn start_server() -> TestServer {
    let cache = Arc::new(HybridCache::local_only());
    let catalog = Arc::new(Catalog::new());
    let app = build_app(AppState::new(cache.clone(), catalog.clone()));

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    TestServer {
        base: format!("http://{addr}"),
        catalog,
        cache,
        shutdown: Some(tx),
        handle,
    }
}

/// Cache stores happen on a spawned task after the response is sent, so
/// tests pause briefly before expecting a hit.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn health_and_stats_endpoints_work() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/", srv.base)).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["service"], "Storefront API");
    assert_eq!(body["status"], "ok");

    let resp = client
        .get(format!("{}/healthz", srv.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!("{}/readyz", srv.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let resp = client
        .get(format!("{}/api/cache/stats", srv.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let stats: Value = resp.json().await.unwrap();
    assert_eq!(stats["active_cache"], "memory");
    assert_eq!(stats["redis_state"], "disconnected");

    srv.stop().await;
}

#[tokio::test]
async fn repeated_get_is_served_from_cache() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/products", srv.base);

    let resp = client.get(&url).send().await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["x-cache"], "miss");
    let first: Value = resp.json().await.unwrap();
    let reads_after_miss = srv.catalog.read_count();
    settle().await;

    let resp = client.get(&url).send().await.unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["x-cache"], "hit");
    let second: Value = resp.json().await.unwrap();

    // Identical payload, and the handler never ran again.
    assert_eq!(first, second);
    assert_eq!(srv.catalog.read_count(), reads_after_miss);

    srv.stop().await;
}

#[tokio::test]
async fn query_parameter_order_does_not_change_the_key() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/products?page=1&limit=20", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-cache"], "miss");
    settle().await;

    let resp = client
        .get(format!("{}/api/products?limit=20&page=1", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-cache"], "hit");

    srv.stop().await;
}

#[tokio::test]
async fn error_responses_are_never_cached() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let url = format!(
        "{}/api/products/00000000-0000-0000-0000-000000000000",
        srv.base
    );

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let reads_after_first = srv.catalog.read_count();
    settle().await;

    let resp = client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    assert!(resp.headers().get("x-cache").is_none());
    // The second miss reached the handler again.
    assert_eq!(srv.catalog.read_count(), reads_after_first + 1);

    srv.stop().await;
}

#[tokio::test]
async fn product_write_invalidates_cached_listings() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let list_url = format!("{}/api/products", srv.base);

    // Warm the listing cache.
    let resp = client.get(&list_url).send().await.unwrap();
    let before: Value = resp.json().await.unwrap();
    assert_eq!(before["pagination"]["total"], 0);
    settle().await;

    let resp = client
        .post(&list_url)
        .json(&json!({ "name": "Mechanical Keyboard", "price_cents": 12900 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    settle().await;

    // The stale listing is gone; the fresh one includes the new product.
    let resp = client.get(&list_url).send().await.unwrap();
    assert_eq!(resp.headers()["x-cache"], "miss");
    let after: Value = resp.json().await.unwrap();
    assert_eq!(after["pagination"]["total"], 1);
    assert_eq!(after["data"][0]["id"], created["id"]);

    srv.stop().await;
}

#[tokio::test]
async fn rejected_writes_do_not_invalidate() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let list_url = format!("{}/api/products", srv.base);

    client.get(&list_url).send().await.unwrap();
    settle().await;

    // Validation failure must leave the cached listing untouched.
    let resp = client
        .post(&list_url)
        .json(&json!({ "name": "", "price_cents": 100 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    settle().await;

    let resp = client.get(&list_url).send().await.unwrap();
    assert_eq!(resp.headers()["x-cache"], "hit");

    srv.stop().await;
}

#[tokio::test]
async fn cart_invalidation_is_scoped_to_one_user() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let alice_url = format!("{}/api/cart/alice", srv.base);
    let bob_url = format!("{}/api/cart/bob", srv.base);

    // Warm both carts.
    client.get(&alice_url).send().await.unwrap();
    client.get(&bob_url).send().await.unwrap();
    settle().await;

    // A write to bob's cart must not evict alice's.
    let resp = client
        .post(format!("{bob_url}/items"))
        .json(&json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    settle().await;

    let resp = client.get(&alice_url).send().await.unwrap();
    assert_eq!(resp.headers()["x-cache"], "hit");

    let resp = client.get(&bob_url).send().await.unwrap();
    assert_eq!(resp.headers()["x-cache"], "miss");
    let cart: Value = resp.json().await.unwrap();
    assert_eq!(cart["items"][0]["quantity"], 2);

    srv.stop().await;
}

#[tokio::test]
async fn delete_purges_both_item_and_listing_entries() {
    let srv = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/products", srv.base))
        .json(&json!({ "name": "Desk Lamp", "price_cents": 4500 }))
        .send()
        .await
        .unwrap();
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    settle().await;

    let item_url = format!("{}/api/products/{id}", srv.base);
    client.get(&item_url).send().await.unwrap();
    client.get(format!("{}/api/products", srv.base)).send().await.unwrap();
    settle().await;

    let resp = client.delete(&item_url).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    settle().await;

    // Neither entry survives the purge.
    let resp = client.get(&item_url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let resp = client
        .get(format!("{}/api/products", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-cache"], "miss");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["pagination"]["total"], 0);

    srv.stop().await;
}

#[tokio::test]
async fn stats_reflect_traffic() {
    let srv = start_server().await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/categories", srv.base);

    client.get(&url).send().await.unwrap();
    settle().await;
    client.get(&url).send().await.unwrap();

    let stats = srv.cache.stats();
    assert_eq!(stats.memory.hits, 1);
    assert_eq!(stats.memory.misses, 1);
    assert!((stats.memory.hit_rate - 0.5).abs() < f64::EPSILON);

    srv.stop().await;
}
