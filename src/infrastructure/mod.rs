pub mod backend;
pub mod cache;
pub mod storage;

pub use backend::{InMemoryBackend, PocketBaseClient};
pub use cache::QueryCacheStore;
pub use storage::{KeyringTokenStore, MemoryTokenStore};
