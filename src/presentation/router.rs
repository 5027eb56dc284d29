use crate::application::services::{GuardOutcome, RouteAccess, RouteGuard};
use crate::domain::value_objects::RecordId;
use serde::Serialize;
use std::sync::Arc;

/// 画面
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "screen", content = "id", rename_all = "snake_case")]
pub enum Screen {
    Home,
    Login,
    Signup,
    Dashboard,
    Profile,
    Todos,
    TodoDetail(RecordId),
    Patients,
    PatientDetail(RecordId),
    NotFound,
}

impl Screen {
    pub fn access(&self) -> RouteAccess {
        match self {
            Screen::Home | Screen::NotFound => RouteAccess::Public,
            Screen::Login | Screen::Signup => RouteAccess::GuestOnly,
            Screen::Dashboard
            | Screen::Profile
            | Screen::Todos
            | Screen::TodoDetail(_)
            | Screen::Patients
            | Screen::PatientDetail(_) => RouteAccess::Protected,
        }
    }

    /// パス（クエリ・フラグメントは無視）をルート表で解決する
    pub fn resolve(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Screen::Home,
            ["login"] => Screen::Login,
            ["signup"] => Screen::Signup,
            ["dashboard"] => Screen::Dashboard,
            ["profile"] => Screen::Profile,
            ["todos"] => Screen::Todos,
            ["todos", id] => RecordId::new(*id).map_or(Screen::NotFound, Screen::TodoDetail),
            ["patients"] => Screen::Patients,
            ["patients", id] => {
                RecordId::new(*id).map_or(Screen::NotFound, Screen::PatientDetail)
            }
            _ => Screen::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "target", rename_all = "snake_case")]
pub enum Navigation {
    Render(Screen),
    Redirect(String),
}

/// ガードを通してから画面を決める
#[derive(Clone)]
pub struct Navigator {
    guard: Arc<RouteGuard>,
}

impl Navigator {
    pub fn new(guard: Arc<RouteGuard>) -> Self {
        Self { guard }
    }

    pub fn navigate(&self, path: &str) -> Navigation {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let screen = Screen::resolve(&path);
        match self.guard.check(screen.access(), &path) {
            GuardOutcome::Allowed => Navigation::Render(screen),
            GuardOutcome::Redirected { to } => Navigation::Redirect(to),
        }
    }

    /// リダイレクトを最後まで辿る（ガードの出力はループしない）
    pub fn resolve(&self, path: &str) -> (String, Screen) {
        let mut current = path.to_string();
        for _ in 0..4 {
            match self.navigate(&current) {
                Navigation::Render(screen) => return (current, screen),
                Navigation::Redirect(to) => current = to,
            }
        }
        (current, Screen::NotFound)
    }
}
