use super::record::Record;
use crate::domain::value_objects::{AuthToken, RecordId};
use serde::{Deserialize, Serialize};

/// ログイン中のユーザー
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: RecordId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub verified: bool,
}

impl From<&Record> for AuthUser {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            email: record.get_str("email").map(str::to_string),
            name: record
                .get_str("name")
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            verified: record.get_bool("verified").unwrap_or(false),
        }
    }
}

impl AuthUser {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(self.id.as_str())
    }
}

/// 認証セッションの状態。認証サブシステムだけが書き換える。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthSession {
    pub is_authenticated: bool,
    pub current_user: Option<AuthUser>,
}

impl AuthSession {
    pub fn signed_in(user: AuthUser) -> Self {
        Self {
            is_authenticated: true,
            current_user: Some(user),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

/// auth-with-password / auth-refresh の応答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: AuthToken,
    pub record: Record,
}

/// 永続化する認証情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAuth {
    pub token: AuthToken,
    pub record: Record,
}

impl From<AuthResponse> for StoredAuth {
    fn from(response: AuthResponse) -> Self {
        Self {
            token: response.token,
            record: response.record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn auth_user_prefers_name_then_email() {
        let fields = json!({ "email": "ada@example.com", "name": "", "verified": true })
            .as_object()
            .cloned()
            .unwrap();
        let record = Record::new(RecordId::new("u1").unwrap(), fields);
        let user = AuthUser::from(&record);
        assert_eq!(user.display_name(), "ada@example.com");
        assert!(user.verified);
    }

    #[test]
    fn auth_response_parses_backend_json() {
        let response: AuthResponse = serde_json::from_value(json!({
            "token": "a.b.c",
            "record": { "id": "u1", "email": "ada@example.com" }
        }))
        .unwrap();
        assert_eq!(response.token.as_str(), "a.b.c");
        assert_eq!(response.record.id.as_str(), "u1");
    }
}
