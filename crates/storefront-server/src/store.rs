//! In-memory catalog repository.
//!
//! Stands in for the database layer, which is outside this service's scope.
//! Handlers treat it exactly like a persistent store; the `reads` counter
//! records every query served so tests can observe whether a request reached
//! the handler or was short-circuited by the response cache.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Unit price in the smallest currency denomination.
    pub price_cents: i64,
    pub category_id: Option<Uuid>,
    pub created_at_ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at_ts: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub updated_at_ts: i64,
}

fn now_ts() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Thread-safe in-memory store for products, categories and carts.
pub struct Catalog {
    products: DashMap<Uuid, Product>,
    categories: DashMap<Uuid, Category>,
    carts: DashMap<String, Cart>,
    /// Number of read queries served. Only incremented by handler-driven
    /// reads, never by cache hits.
    reads: AtomicU64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            categories: DashMap::new(),
            carts: DashMap::new(),
            reads: AtomicU64::new(0),
        }
    }

    fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    /// How many read queries have reached the store.
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    // ----- products -----

    /// List products with 1-based pagination. Returns the page and the
    /// total product count.
    pub fn list_products(&self, page: usize, limit: usize) -> (Vec<Product>, usize) {
        self.record_read();
        let mut all: Vec<Product> = self.products.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at_ts
                .cmp(&b.created_at_ts)
                .then_with(|| a.id.cmp(&b.id))
        });
        let total = all.len();
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let items = all
            .into_iter()
            .skip((page - 1) * limit)
            .take(limit)
            .collect();
        (items, total)
    }

    pub fn get_product(&self, id: Uuid) -> Option<Product> {
        self.record_read();
        self.products.get(&id).map(|p| p.value().clone())
    }

    pub fn insert_product(&self, new: NewProduct) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            price_cents: new.price_cents,
            category_id: new.category_id,
            created_at_ts: now_ts(),
        };
        self.products.insert(product.id, product.clone());
        product
    }

    pub fn update_product(&self, id: Uuid, update: ProductUpdate) -> Option<Product> {
        let mut entry = self.products.get_mut(&id)?;
        if let Some(name) = update.name {
            entry.name = name;
        }
        if let Some(description) = update.description {
            entry.description = description;
        }
        if let Some(price_cents) = update.price_cents {
            entry.price_cents = price_cents;
        }
        if let Some(category_id) = update.category_id {
            entry.category_id = Some(category_id);
        }
        Some(entry.value().clone())
    }

    pub fn remove_product(&self, id: Uuid) -> bool {
        self.products.remove(&id).is_some()
    }

    // ----- categories -----

    pub fn list_categories(&self) -> Vec<Category> {
        self.record_read();
        let mut all: Vec<Category> = self.categories.iter().map(|c| c.value().clone()).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        all
    }

    pub fn get_category(&self, id: Uuid) -> Option<Category> {
        self.record_read();
        self.categories.get(&id).map(|c| c.value().clone())
    }

    pub fn insert_category(&self, new: NewCategory) -> Category {
        let category = Category {
            id: Uuid::new_v4(),
            name: new.name,
            created_at_ts: now_ts(),
        };
        self.categories.insert(category.id, category.clone());
        category
    }

    pub fn remove_category(&self, id: Uuid) -> bool {
        self.categories.remove(&id).is_some()
    }

    // ----- carts -----

    pub fn get_cart(&self, user: &str) -> Cart {
        self.record_read();
        self.carts
            .get(user)
            .map(|c| c.value().clone())
            .unwrap_or_default()
    }

    /// Add an item to a cart, merging quantities for an existing product.
    pub fn add_cart_item(&self, user: &str, item: CartItem) -> Cart {
        let mut cart = self.carts.entry(user.to_string()).or_default();
        match cart
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            }
            None => cart.items.push(item),
        }
        cart.updated_at_ts = now_ts();
        cart.value().clone()
    }

    pub fn clear_cart(&self, user: &str) -> bool {
        self.carts.remove(user).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: String::new(),
            price_cents: 1000,
            category_id: None,
        }
    }

    #[test]
    fn pagination_clamps_and_slices() {
        let catalog = Catalog::new();
        for i in 0..5 {
            catalog.insert_product(product(&format!("p{i}")));
        }

        let (page1, total) = catalog.list_products(1, 2);
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);

        let (page3, _) = catalog.list_products(3, 2);
        assert_eq!(page3.len(), 1);

        let (past_end, _) = catalog.list_products(10, 2);
        assert!(past_end.is_empty());

        // page 0 is treated as page 1
        let (page0, _) = catalog.list_products(0, 2);
        assert_eq!(page0.len(), 2);
    }

    #[test]
    fn reads_are_counted_but_writes_are_not() {
        let catalog = Catalog::new();
        let p = catalog.insert_product(product("widget"));
        assert_eq!(catalog.read_count(), 0);

        let _ = catalog.get_product(p.id);
        let _ = catalog.list_products(1, 10);
        assert_eq!(catalog.read_count(), 2);
    }

    #[test]
    fn product_update_is_partial() {
        let catalog = Catalog::new();
        let p = catalog.insert_product(product("widget"));

        let updated = catalog
            .update_product(
                p.id,
                ProductUpdate {
                    name: None,
                    description: None,
                    price_cents: Some(2500),
                    category_id: None,
                },
            )
            .expect("product exists");
        assert_eq!(updated.name, "widget");
        assert_eq!(updated.price_cents, 2500);
    }

    #[test]
    fn cart_merges_quantities() {
        let catalog = Catalog::new();
        let id = Uuid::new_v4();
        catalog.add_cart_item(
            "alice",
            CartItem {
                product_id: id,
                quantity: 1,
            },
        );
        let cart = catalog.add_cart_item(
            "alice",
            CartItem {
                product_id: id,
                quantity: 2,
            },
        );
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);

        assert!(catalog.clear_cart("alice"));
        assert!(catalog.get_cart("alice").items.is_empty());
    }

    #[test]
    fn cart_quantity_saturates_instead_of_overflowing() {
        let catalog = Catalog::new();
        let id = Uuid::new_v4();
        catalog.add_cart_item(
            "alice",
            CartItem {
                product_id: id,
                quantity: u32::MAX,
            },
        );
        let cart = catalog.add_cart_item(
            "alice",
            CartItem {
                product_id: id,
                quantity: 2,
            },
        );
        assert_eq!(cart.items[0].quantity, u32::MAX);
    }
}
