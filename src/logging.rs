use crate::config::AppConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber from configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Safe to call once
/// per process; subsequent calls are ignored so embedding applications and
/// tests can both initialize freely.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = fmt().with_env_filter(filter).with_target(true);

    let result = if config.log_json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized, skipping");
    }
}
