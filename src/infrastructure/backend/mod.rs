pub mod memory_backend;
pub mod pocketbase_client;
pub mod realtime;

pub use memory_backend::{BackendOp, InMemoryBackend, WritePause};
pub use pocketbase_client::PocketBaseClient;
