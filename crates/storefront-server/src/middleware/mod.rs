pub mod cache;
pub mod invalidate;

pub use cache::response_cache;
pub use invalidate::invalidate_on_write;
