//! Structured logging setup.
use std::str::FromStr;

use eyre::{Result, WrapErr};
use tracing::Level;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::bootstrap::LoggingConfig;

/// Parse the configured level strictly. `EnvFilter` would accept any token
/// here by treating it as a target directive, which silently swallows typos
/// like "inof".
fn parse_level(level: &str) -> Result<Level> {
    Level::from_str(level).wrap_err_with(|| format!("invalid log level: {level}"))
}

/// Initialize the global subscriber from the bootstrap logging section.
/// `RUST_LOG` wins over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(parse_level(&config.level)?.to_string()),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if config.json {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.json().with_current_span(false).with_span_list(true))
            .init();
    } else {
        Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .init();
    }
    Ok(())
}
