pub mod auth_token;
pub mod collection;
pub mod query_key;
pub mod realtime;
pub mod record_id;

pub use auth_token::AuthToken;
pub use collection::{CollectionName, PATIENTS_COLLECTION, TODOS_COLLECTION, USERS_COLLECTION};
pub use query_key::{ListQuery, QueryFilter, QueryKey, QueryKind};
pub use realtime::{RealtimeAction, SubscriptionTopic};
pub use record_id::{PLACEHOLDER_PREFIX, RecordId};
