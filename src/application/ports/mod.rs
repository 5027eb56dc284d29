pub mod auth_store;
pub mod backend;
pub mod query_cache;

pub use auth_store::AuthTokenStore;
pub use backend::{BackendClient, RealtimeStream};
pub use query_cache::{
    CacheEntry, CacheLookup, CacheSnapshot, CacheUpdater, CachedData, FetchTicket, QueryCache,
};
