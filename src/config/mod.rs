mod settings;

use config::{Config, ConfigError, Environment, File};
use serde::de::DeserializeOwned;
use tracing::warn;

pub use settings::{PublisherSettings, RegistrySettings, Settings, SubscriberSettings};

/// Prefix for environment overrides, e.g. `UDPSUB_PUBLISHER__MAX_RETRIES=7`.
pub const ENV_PREFIX: &str = "UDPSUB";

/// Loads the configuration from the default file, `.env` and environment variables.
///
/// Absent keys keep their `Settings::default()` value. If any key cannot be
/// parsed, every key is merged over the defaults one at a time instead, so a
/// single bad value never prevents a node from starting.
pub fn load_config() -> Result<Settings, ConfigError> {
    let _ = dotenvy::dotenv();

    let config = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // whole-document fast path; a single bad key drops to per-key merging
    match config.clone().try_deserialize::<Settings>() {
        Ok(settings) => Ok(settings),
        Err(e) => {
            warn!(error = %e, "configuration has invalid values, merging key by key");
            Ok(merge_with_defaults(&config))
        }
    }
}

fn merge_with_defaults(config: &Config) -> Settings {
    let default = Settings::default();

    Settings {
        registry: RegistrySettings {
            host: lookup(config, "registry.host", default.registry.host),
            port: lookup(config, "registry.port", default.registry.port),
            endpoint_lease_secs: lookup(
                config,
                "registry.endpoint_lease_secs",
                default.registry.endpoint_lease_secs,
            ),
            ack_relay_ttl_ms: lookup(
                config,
                "registry.ack_relay_ttl_ms",
                default.registry.ack_relay_ttl_ms,
            ),
            forward_metadata: lookup(
                config,
                "registry.forward_metadata",
                default.registry.forward_metadata,
            ),
        },
        subscriber: SubscriberSettings {
            host: lookup(config, "subscriber.host", default.subscriber.host),
            port: lookup(config, "subscriber.port", default.subscriber.port),
            port_scan_end: lookup(
                config,
                "subscriber.port_scan_end",
                default.subscriber.port_scan_end,
            ),
            ack_retry_interval_ms: lookup(
                config,
                "subscriber.ack_retry_interval_ms",
                default.subscriber.ack_retry_interval_ms,
            ),
            max_ack_retries: lookup(
                config,
                "subscriber.max_ack_retries",
                default.subscriber.max_ack_retries,
            ),
            filter_keyword: lookup(
                config,
                "subscriber.filter_keyword",
                default.subscriber.filter_keyword,
            ),
            high_priority_only: lookup(
                config,
                "subscriber.high_priority_only",
                default.subscriber.high_priority_only,
            ),
            time_limit_secs: lookup(
                config,
                "subscriber.time_limit_secs",
                default.subscriber.time_limit_secs,
            ),
            resubscribe_interval_ms: lookup(
                config,
                "subscriber.resubscribe_interval_ms",
                default.subscriber.resubscribe_interval_ms,
            ),
        },
        publisher: PublisherSettings {
            max_retries: lookup(config, "publisher.max_retries", default.publisher.max_retries),
            retry_delay_ms: lookup(
                config,
                "publisher.retry_delay_ms",
                default.publisher.retry_delay_ms,
            ),
            filter_keyword: lookup(
                config,
                "publisher.filter_keyword",
                default.publisher.filter_keyword,
            ),
            enable_filtering: lookup(
                config,
                "publisher.enable_filtering",
                default.publisher.enable_filtering,
            ),
        },
    }
}

fn lookup<T: DeserializeOwned>(config: &Config, key: &str, default: T) -> T {
    match config.get::<T>(key) {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => default,
        Err(e) => {
            warn!(key, error = %e, "invalid configuration value, using default");
            default
        }
    }
}
