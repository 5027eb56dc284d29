use super::session::SessionReader;
use crate::shared::config::RouterConfig;
use reqwest::Url;
use tracing::debug;

pub const REDIRECT_PARAM: &str = "redirect";

/// ルートのアクセス区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Public,
    /// 認証済みのみ
    Protected,
    /// 未認証のみ（ログイン・サインアップ）
    GuestOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allowed,
    Redirected { to: String },
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allowed)
    }
}

/// 遷移のたびにセッションを見て許可・リダイレクトを決める。遷移間で状態は持たない。
#[derive(Debug, Clone)]
pub struct RouteGuard {
    config: RouterConfig,
    session: SessionReader,
}

impl RouteGuard {
    pub fn new(config: RouterConfig, session: SessionReader) -> Self {
        Self { config, session }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn check(&self, access: RouteAccess, path: &str) -> GuardOutcome {
        let outcome = self.evaluate(access, path, self.session.is_authenticated());
        debug!(path, ?access, ?outcome, "route guard");
        outcome
    }

    pub fn evaluate(
        &self,
        access: RouteAccess,
        path: &str,
        is_authenticated: bool,
    ) -> GuardOutcome {
        match access {
            RouteAccess::Protected if !is_authenticated => GuardOutcome::Redirected {
                to: self.login_url(path),
            },
            RouteAccess::GuestOnly if is_authenticated => GuardOutcome::Redirected {
                to: self.config.default_redirect.clone(),
            },
            _ => GuardOutcome::Allowed,
        }
    }

    /// `login_path?redirect=<エンコード済みパス>`
    pub fn login_url(&self, attempted: &str) -> String {
        let Ok(mut url) =
            Url::parse("http://localhost").and_then(|base| base.join(&self.config.login_path))
        else {
            return self.config.login_path.clone();
        };
        url.query_pairs_mut().append_pair(REDIRECT_PARAM, attempted);
        match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        }
    }

    /// ログイン後の遷移先。不正な redirect は既定の遷移先に置き換える。
    pub fn post_login_target(&self, redirect: Option<&str>) -> String {
        redirect
            .and_then(normalize_redirect)
            .unwrap_or_else(|| self.config.default_redirect.clone())
    }
}

/// アプリ内パスとして安全な redirect だけを絶対パスに正規化して返す
pub fn normalize_redirect(raw: &str) -> Option<String> {
    if raw.chars().any(char::is_control) {
        return None;
    }
    let candidate = raw.trim();
    if candidate.is_empty()
        || candidate.contains('\\')
        || candidate.starts_with("//")
        || has_scheme(candidate)
    {
        return None;
    }
    if candidate.starts_with('/') {
        Some(candidate.to_string())
    } else {
        Some(format!("/{candidate}"))
    }
}

fn has_scheme(candidate: &str) -> bool {
    let head_end = candidate
        .find(['/', '?', '#'])
        .unwrap_or(candidate.len());
    candidate[..head_end].contains(':')
}
