pub mod query_cache_store;

pub use query_cache_store::QueryCacheStore;
