use super::{CollectionName, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RealtimeAction {
    Create,
    Update,
    Delete,
}

impl RealtimeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RealtimeAction::Create => "create",
            RealtimeAction::Update => "update",
            RealtimeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for RealtimeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RealtimeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(RealtimeAction::Create),
            "update" => Ok(RealtimeAction::Update),
            "delete" => Ok(RealtimeAction::Delete),
            other => Err(format!("Unknown realtime action: {other}")),
        }
    }
}

/// 購読対象。コレクション全体か、単一レコードか。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionTopic {
    Collection(CollectionName),
    Record(CollectionName, RecordId),
}

impl SubscriptionTopic {
    pub fn collection(&self) -> &CollectionName {
        match self {
            SubscriptionTopic::Collection(collection) => collection,
            SubscriptionTopic::Record(collection, _) => collection,
        }
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        match self {
            SubscriptionTopic::Collection(_) => None,
            SubscriptionTopic::Record(_, id) => Some(id),
        }
    }

    /// バックエンドの購読トピック文字列（`todos/*` または `todos/<id>`）
    pub fn as_topic(&self) -> String {
        match self {
            SubscriptionTopic::Collection(collection) => format!("{collection}/*"),
            SubscriptionTopic::Record(collection, id) => format!("{collection}/{id}"),
        }
    }

    pub fn accepts(&self, collection: &CollectionName, id: &RecordId) -> bool {
        match self {
            SubscriptionTopic::Collection(c) => c == collection,
            SubscriptionTopic::Record(c, rid) => c == collection && rid == id,
        }
    }
}

impl fmt::Display for SubscriptionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_render_like_the_backend_expects() {
        let todos = CollectionName::todos();
        let id = RecordId::new("abc").unwrap();
        assert_eq!(SubscriptionTopic::Collection(todos.clone()).as_topic(), "todos/*");
        assert_eq!(
            SubscriptionTopic::Record(todos.clone(), id.clone()).as_topic(),
            "todos/abc"
        );
    }

    #[test]
    fn record_topic_only_accepts_its_record() {
        let todos = CollectionName::todos();
        let id = RecordId::new("abc").unwrap();
        let topic = SubscriptionTopic::Record(todos.clone(), id.clone());
        assert!(topic.accepts(&todos, &id));
        assert!(!topic.accepts(&todos, &RecordId::new("other").unwrap()));
        assert!(!topic.accepts(&CollectionName::patients(), &id));
    }

    #[test]
    fn action_parses_wire_names() {
        assert_eq!("update".parse::<RealtimeAction>(), Ok(RealtimeAction::Update));
        assert!("upsert".parse::<RealtimeAction>().is_err());
    }
}
