// Tracing initialization for hosts embedding the keeper

use std::sync::Once;

use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    EnvFilter, Registry,
};

use crate::config::KeeperConfig;

static TEST_INIT: Once = Once::new();

/// Install the global tracing subscriber.
///
/// * `log_level`: filter directives, e.g. `"info"` or `"capkeeper_core=debug,warn"`.
///   `RUST_LOG` takes precedence when set. Defaults to `"info"`.
/// * `json_output`: emit JSON lines instead of human-readable output. Defaults to `false`.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(log_level: Option<&str>, json_output: Option<bool>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))?;

    let subscriber = Registry::default().with(env_filter);

    if json_output.unwrap_or(false) {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_span_list(true);
        tracing::subscriber::set_global_default(subscriber.with(json_layer))?;
    } else {
        let fmt_layer = fmt::layer()
            .pretty()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_level(true);
        tracing::subscriber::set_global_default(subscriber.with(fmt_layer))?;
    }

    Ok(())
}

/// Install the subscriber described by `config`
pub fn init_from_config(config: &KeeperConfig) -> Result<()> {
    init_tracing(Some(&config.log_level), Some(config.json_logs))
}

/// Initialize debug logging for tests, once per test binary
pub fn init_test_logging() {
    TEST_INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = Registry::default()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_test_writer());
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
