use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 楽観的に作成したレコードの仮 ID の接頭辞。
/// バックエンドの ID は英数字のみなので `-` を含むこの形式とは衝突しない。
pub const PLACEHOLDER_PREFIX: &str = "temp-";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// サーバー確認前のレコードに付ける仮 ID（タイムスタンプ由来）
    pub fn placeholder() -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| char::from(c).to_ascii_lowercase())
            .collect();
        Self(format!(
            "{PLACEHOLDER_PREFIX}{}-{suffix}",
            Utc::now().timestamp_millis()
        ))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Record id cannot be empty".to_string());
        }
        if value.contains(['/', '?', '#']) || value.chars().any(char::is_whitespace) {
            return Err(format!("Invalid record id: {value}"));
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RecordId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_marked_and_distinct() {
        let a = RecordId::placeholder();
        let b = RecordId::placeholder();
        assert!(a.is_placeholder());
        assert_ne!(a, b);
        assert!(!RecordId::new("abc123def456ghi").unwrap().is_placeholder());
    }

    #[test]
    fn rejects_ids_that_would_break_urls() {
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("a/b").is_err());
        assert!(RecordId::new("a b").is_err());
    }
}
