use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8090";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub cache: CacheConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout: u64,
    pub auth_collection: String,
    pub realtime_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// 取得後この秒数を過ぎたエントリは stale 扱い
    pub stale_time: u64,
    pub max_entries: usize,
    pub retry_count: u32,
    pub retry_delay_ms: u64,
    pub page_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub login_path: String,
    pub signup_path: String,
    pub default_redirect: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            cache: CacheConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: 30,
            auth_collection: "users".to_string(),
            realtime_buffer: 64,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            stale_time: 0,
            max_entries: 500,
            retry_count: 3,
            retry_delay_ms: 1000,
            page_size: 20,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            signup_path: "/signup".to_string(),
            default_redirect: "/dashboard".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 環境変数の代わりに任意のルックアップ関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("POCKET_STARTER_BACKEND_URL")
            .or_else(|| lookup("POCKETBASE_URL"))
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
        {
            cfg.backend.base_url = url;
        }
        if let Some(value) = lookup("POCKET_STARTER_REQUEST_TIMEOUT_SECS").and_then(|v| parse_u64(&v)) {
            cfg.backend.request_timeout = value.max(1);
        }
        if let Some(value) = lookup("POCKET_STARTER_STALE_TIME_SECS").and_then(|v| parse_u64(&v)) {
            cfg.cache.stale_time = value;
        }
        if let Some(value) = lookup("POCKET_STARTER_CACHE_MAX_ENTRIES").and_then(|v| parse_u64(&v)) {
            cfg.cache.max_entries = value as usize;
        }
        if let Some(value) = lookup("POCKET_STARTER_QUERY_RETRY").and_then(|v| parse_u64(&v)) {
            cfg.cache.retry_count = value.min(u32::MAX as u64) as u32;
        }
        if let Some(value) = lookup("POCKET_STARTER_QUERY_RETRY_DELAY_MS").and_then(|v| parse_u64(&v)) {
            cfg.cache.retry_delay_ms = value;
        }
        if let Some(value) = lookup("POCKET_STARTER_DEFAULT_REDIRECT") {
            let value = value.trim().to_string();
            if !value.is_empty() {
                cfg.router.default_redirect = value;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        let url = self.backend.base_url.trim();
        if url.is_empty() {
            return Err("Backend base_url must not be empty".to_string());
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(format!("Backend base_url must be http(s): {url}"));
        }
        if self.backend.auth_collection.trim().is_empty() {
            return Err("Backend auth_collection must not be empty".to_string());
        }
        if self.cache.max_entries == 0 {
            return Err("Cache max_entries must be greater than 0".to_string());
        }
        if self.cache.page_size == 0 {
            return Err("Cache page_size must be greater than 0".to_string());
        }
        if !self.router.default_redirect.starts_with('/') {
            return Err("Router default_redirect must be an absolute path".to_string());
        }
        Ok(())
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.backend.base_url, DEFAULT_BACKEND_URL);
    }

    #[test]
    fn backend_url_prefers_dedicated_variable_and_trims_slash() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("POCKET_STARTER_BACKEND_URL", "https://api.example.com/"),
            ("POCKETBASE_URL", "http://ignored:8090"),
        ]));
        assert_eq!(cfg.backend.base_url, "https://api.example.com");

        let fallback = AppConfig::from_lookup(lookup_from(&[("POCKETBASE_URL", "http://pb:8090")]));
        assert_eq!(fallback.backend.base_url, "http://pb:8090");
    }

    #[test]
    fn numeric_overrides_ignore_garbage() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("POCKET_STARTER_QUERY_RETRY", "0"),
            ("POCKET_STARTER_STALE_TIME_SECS", "abc"),
            ("POCKET_STARTER_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert_eq!(cfg.cache.retry_count, 0);
        assert_eq!(cfg.cache.stale_time, 0);
        assert_eq!(cfg.backend.request_timeout, 1);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.backend.base_url = "ftp://nope".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.cache.max_entries = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.router.default_redirect = "dashboard".into();
        assert!(cfg.validate().is_err());
    }
}
