pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod state;

pub use shared::config::AppConfig;
pub use shared::error::AppError;
pub use state::AppState;

pub const DEFAULT_LOG_FILTER: &str = "pocket_starter=debug,pocket_starter_lib=debug,info";

/// ログ設定の初期化（`RUST_LOG` が優先）
pub fn init_logging() {
    init_logging_with(DEFAULT_LOG_FILTER, false);
}

pub fn init_logging_with(level: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let fmt_layer = if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    // テストなどで二重に初期化された場合は既存の設定を使う
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init();
}
