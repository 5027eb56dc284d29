use crate::domain::value_objects::{CollectionName, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// コレクション固有のフィールド（id / タイムスタンプ以外）
pub type Fields = Map<String, Value>;

/// システムフィールド。部分更新で上書きしない。
const SYSTEM_FIELDS: [&str; 5] = ["id", "created", "updated", "collectionId", "collectionName"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default = "Utc::now", with = "pb_datetime")]
    pub created: DateTime<Utc>,
    #[serde(default = "Utc::now", with = "pb_datetime")]
    pub updated: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, fields: Fields) -> Self {
        let now = Utc::now();
        Self {
            id,
            collection_id: None,
            collection_name: None,
            created: now,
            updated: now,
            fields: strip_system_fields(fields),
        }
    }

    /// サーバー確認前の仮レコードを作る
    pub fn placeholder(collection: &CollectionName, fields: Fields) -> Self {
        let mut record = Self::new(RecordId::placeholder(), fields);
        record.collection_name = Some(collection.to_string());
        record
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_placeholder()
    }

    /// 部分フィールドをその場で適用し、更新時刻を進める
    pub fn apply_changes(&mut self, changes: &Fields) {
        for (key, value) in changes {
            if SYSTEM_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
        self.updated = Utc::now();
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }
}

pub fn strip_system_fields(mut fields: Fields) -> Fields {
    for key in SYSTEM_FIELDS {
        fields.remove(key);
    }
    fields
}

/// 一覧クエリの結果（並び順つきのレコード列と総件数）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<Record>,
}

impl RecordPage {
    pub fn new(page: u32, per_page: u32, total_items: i64, items: Vec<Record>) -> Self {
        let mut result = Self {
            page,
            per_page,
            total_items,
            total_pages: 0,
            items,
        };
        result.recount_pages();
        result
    }

    pub fn empty(page: u32, per_page: u32) -> Self {
        Self::new(page, per_page, 0, Vec::new())
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.items.iter().any(|record| &record.id == id)
    }

    /// 先頭に追加して総件数を 1 増やす
    pub fn prepend(&mut self, record: Record) {
        self.items.retain(|existing| existing.id != record.id);
        self.items.insert(0, record);
        self.total_items = self.total_items.max(0) + 1;
        self.recount_pages();
    }

    /// id を取り除き総件数を 1 減らす（0 未満にはしない）
    pub fn remove(&mut self, id: &RecordId) -> bool {
        let before = self.items.len();
        self.items.retain(|record| &record.id != id);
        self.total_items = (self.total_items - 1).max(0);
        self.recount_pages();
        self.items.len() != before
    }

    /// id に一致する全ての要素に部分フィールドを適用する
    pub fn patch(&mut self, id: &RecordId, changes: &Fields) -> usize {
        let mut patched = 0;
        for record in self.items.iter_mut().filter(|record| &record.id == id) {
            record.apply_changes(changes);
            patched += 1;
        }
        patched
    }

    fn recount_pages(&mut self) {
        self.total_pages = if self.per_page == 0 {
            0
        } else {
            let per_page = i64::from(self.per_page);
            (self.total_items.max(0) + per_page - 1) / per_page
        };
    }
}

/// 型付きのページ（`RecordPage` の各レコードを変換したもの）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub page: u32,
    pub per_page: u32,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

impl<T> Paged<T> {
    pub fn try_from_page<F, E>(page: &RecordPage, convert: F) -> Result<Self, E>
    where
        F: Fn(&Record) -> Result<T, E>,
    {
        let items = page.items.iter().map(convert).collect::<Result<Vec<_>, E>>()?;
        Ok(Self {
            page: page.page,
            per_page: page.per_page,
            total_items: page.total_items,
            total_pages: page.total_pages,
            items,
        })
    }
}

/// バックエンドの日時形式（`2024-01-01 10:00:00.123Z`）と RFC 3339 の両方を受け付ける
pub mod pb_datetime {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Utc::now());
        }
        if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
            return Ok(value.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.fZ")
            .map(|naive| naive.and_utc())
            .map_err(|err| format!("Invalid datetime {raw:?}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, title: &str) -> Record {
        let fields = json!({ "title": title }).as_object().cloned().unwrap();
        Record::new(RecordId::new(id).unwrap(), fields)
    }

    #[test]
    fn deserializes_backend_payload() {
        let payload = json!({
            "id": "abc123",
            "collectionId": "pbc_1",
            "collectionName": "todos",
            "created": "2024-05-01 08:30:00.123Z",
            "updated": "2024-05-01T09:00:00Z",
            "title": "Buy milk",
            "completed": false
        });
        let record: Record = serde_json::from_value(payload).unwrap();
        assert_eq!(record.id.as_str(), "abc123");
        assert_eq!(record.collection_name.as_deref(), Some("todos"));
        assert_eq!(record.get_str("title"), Some("Buy milk"));
        assert_eq!(record.get_bool("completed"), Some(false));
        assert_eq!(record.created.timestamp_subsec_millis(), 123);
        assert!(!record.fields.contains_key("id"));
    }

    #[test]
    fn apply_changes_skips_system_fields() {
        let mut rec = record("r1", "old");
        let changes = json!({ "title": "new", "id": "hijack" })
            .as_object()
            .cloned()
            .unwrap();
        rec.apply_changes(&changes);
        assert_eq!(rec.id.as_str(), "r1");
        assert_eq!(rec.get_str("title"), Some("new"));
    }

    #[test]
    fn page_prepend_and_remove_adjust_counts() {
        let mut page = RecordPage::new(1, 2, 1, vec![record("a", "A")]);
        page.prepend(record("b", "B"));
        assert_eq!(page.items[0].id.as_str(), "b");
        assert_eq!(page.total_items, 2);
        assert_eq!(page.total_pages, 1);

        assert!(page.remove(&RecordId::new("a").unwrap()));
        assert_eq!(page.total_items, 1);

        let mut empty = RecordPage::empty(1, 20);
        assert!(!empty.remove(&RecordId::new("zzz").unwrap()));
        assert_eq!(empty.total_items, 0);
    }
}
