pub mod entities;
pub mod value_objects;

pub use entities::{AuthSession, AuthUser, Patient, Record, RecordPage, RealtimeEvent, Todo};
pub use value_objects::{CollectionName, ListQuery, QueryFilter, QueryKey, QueryKind, RecordId};
