//! Tracing subscriber setup.
//!
//! All log output goes to **stderr** so stdout stays a clean stream of
//! protocol frames. `RUST_LOG` overrides the configured level.

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: '{}'", level))
}

/// Install the global subscriber. Call once, before any request is served.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(parse_level(&config.level)?.into())
        .from_env_lossy();

    let layer = match config.format.as_str() {
        "json" => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_target(false)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_levels() {
        for level in ["trace", "debug", "info", "warn", "error", "off", "INFO"] {
            assert!(parse_level(level).is_ok(), "{}", level);
        }
    }

    #[test]
    fn rejects_garbage_level() {
        assert!(parse_level("loud").is_err());
    }
}
