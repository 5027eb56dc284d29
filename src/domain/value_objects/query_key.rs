use super::{CollectionName, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    List,
    Detail,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::List => "list",
            QueryKind::Detail => "detail",
        }
    }
}

/// 一覧取得のパラメータ
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListQuery {
    pub page: u32,
    pub per_page: u32,
    pub sort: Option<String>,
    pub filter: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            sort: None,
            filter: None,
        }
    }
}

impl ListQuery {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// キャッシュキー用の正規化済みパラメータ（空の sort / filter は含めない）
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("page".to_string(), self.page.to_string());
        params.insert("perPage".to_string(), self.per_page.to_string());
        if let Some(sort) = self.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.insert("sort".to_string(), sort.to_string());
        }
        if let Some(filter) = self.filter.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.insert("filter".to_string(), filter.to_string());
        }
        params
    }
}

/// キャッシュストアのキー。(コレクション, 種別, 正規化パラメータ) の組で完全一致検索する。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryKey {
    collection: CollectionName,
    kind: QueryKind,
    params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn list(collection: &CollectionName, query: &ListQuery) -> Self {
        Self {
            collection: collection.clone(),
            kind: QueryKind::List,
            params: query.to_params(),
        }
    }

    pub fn detail(collection: &CollectionName, id: &RecordId) -> Self {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), id.as_str().to_string());
        Self {
            collection: collection.clone(),
            kind: QueryKind::Detail,
            params,
        }
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn detail_id(&self) -> Option<&str> {
        match self.kind {
            QueryKind::Detail => self.params.get("id").map(String::as_str),
            QueryKind::List => None,
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.collection, self.kind.as_str())?;
        let mut sep = ':';
        for (key, value) in &self.params {
            write!(f, "{sep}{key}={value}")?;
            sep = '&';
        }
        Ok(())
    }
}

/// 複数キーをまとめて選択するフィルタ（キャンセル・スナップショット・無効化で使う）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub collection: CollectionName,
    pub kind: Option<QueryKind>,
    pub id: Option<RecordId>,
}

impl QueryFilter {
    pub fn collection(collection: &CollectionName) -> Self {
        Self {
            collection: collection.clone(),
            kind: None,
            id: None,
        }
    }

    pub fn lists(collection: &CollectionName) -> Self {
        Self {
            collection: collection.clone(),
            kind: Some(QueryKind::List),
            id: None,
        }
    }

    pub fn detail(collection: &CollectionName, id: &RecordId) -> Self {
        Self {
            collection: collection.clone(),
            kind: Some(QueryKind::Detail),
            id: Some(id.clone()),
        }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        if key.collection() != &self.collection {
            return false;
        }
        if let Some(kind) = self.kind {
            if key.kind() != kind {
                return false;
            }
        }
        match &self.id {
            Some(id) => key.detail_id() == Some(id.as_str()),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_keys_are_canonical() {
        let todos = CollectionName::todos();
        let a = QueryKey::list(&todos, &ListQuery::default().with_sort("  "));
        let b = QueryKey::list(&todos, &ListQuery::default());
        assert_eq!(a, b);

        let sorted = QueryKey::list(&todos, &ListQuery::default().with_sort("-created"));
        assert_ne!(a, sorted);
    }

    #[test]
    fn filter_matches_by_collection_kind_and_id() {
        let todos = CollectionName::todos();
        let id = RecordId::new("abc").unwrap();
        let list = QueryKey::list(&todos, &ListQuery::default());
        let detail = QueryKey::detail(&todos, &id);
        let other = QueryKey::detail(&CollectionName::patients(), &id);

        assert!(QueryFilter::collection(&todos).matches(&list));
        assert!(QueryFilter::collection(&todos).matches(&detail));
        assert!(!QueryFilter::collection(&todos).matches(&other));
        assert!(QueryFilter::lists(&todos).matches(&list));
        assert!(!QueryFilter::lists(&todos).matches(&detail));
        assert!(QueryFilter::detail(&todos, &id).matches(&detail));
        assert!(!QueryFilter::detail(&todos, &RecordId::new("zzz").unwrap()).matches(&detail));
    }

    #[test]
    fn display_is_readable() {
        let key = QueryKey::detail(&CollectionName::todos(), &RecordId::new("r1").unwrap());
        assert_eq!(key.to_string(), "todos:detail:id=r1");
    }
}
