use super::record::Record;
use crate::domain::value_objects::{CollectionName, RealtimeAction};
use serde::{Deserialize, Serialize};

/// バックエンドから push されるレコード変更通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub action: RealtimeAction,
    pub record: Record,
    pub collection: CollectionName,
}

impl RealtimeEvent {
    pub fn new(action: RealtimeAction, record: Record, collection: CollectionName) -> Self {
        Self {
            action,
            record,
            collection,
        }
    }
}
