pub mod dto;
pub mod handlers;
pub mod router;

pub use router::{Navigation, Navigator, Screen};
