use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// バックエンドが発行する JWT 形式の認証トークン
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthToken(String);

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err("Auth token cannot be empty".to_string());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// ペイロードの `exp` クレームを読む（署名は検証しない）
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let claims: Claims = serde_json::from_slice(&bytes).ok()?;
        Utc.timestamp_opt(claims.exp?, 0).single()
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp > now)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // トークン本体はログに出さない
        f.debug_tuple("AuthToken").field(&"<redacted>").finish()
    }
}

#[cfg(test)]
pub(crate) fn token_expiring_at(exp: i64) -> AuthToken {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"u1","exp":{exp}}}"#));
    AuthToken::new(format!("{header}.{payload}.signature")).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_claim() {
        let token = token_expiring_at(2_000_000_000);
        assert_eq!(token.expires_at().unwrap().timestamp(), 2_000_000_000);
        assert!(token.is_valid_at(Utc.timestamp_opt(1_900_000_000, 0).unwrap()));
        assert!(!token.is_valid_at(Utc.timestamp_opt(2_100_000_000, 0).unwrap()));
    }

    #[test]
    fn malformed_tokens_are_never_valid() {
        assert!(!AuthToken::new("not-a-jwt").unwrap().is_valid());
        assert!(!AuthToken::new("a.!!!.c").unwrap().is_valid());
        assert!(AuthToken::new("  ").is_err());
    }

    #[test]
    fn debug_output_hides_the_token() {
        let token = token_expiring_at(1);
        assert!(!format!("{token:?}").contains("signature"));
    }
}
