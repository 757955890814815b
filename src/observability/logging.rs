//! Structured logging.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.log_level).into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(config.log_targets))
        .try_init();
}

fn default_filter(level: &str) -> String {
    format!("asset_hub_client={level},asset_transfer={level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_scopes_crate() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("asset_hub_client=debug"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn init_twice_is_harmless() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        init_logging(&config);
    }
}
