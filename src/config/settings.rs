use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// One section per role a process can play. A node that both publishes and
/// subscribes reads the `publisher` and `subscriber` sections side by side.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub registry: RegistrySettings,
    pub subscriber: SubscriberSettings,
    pub publisher: PublisherSettings,
}

/// Where the registry listens, and how it manages its directory.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RegistrySettings {
    pub host: String,
    pub port: u16,
    /// Seconds an endpoint stays registered without a fresh SUBSCRIBE. 0 disables expiry.
    pub endpoint_lease_secs: u64,
    /// How long the origin of a forwarded message is remembered for ACK relay.
    pub ack_relay_ttl_ms: u64,
    /// Forward priority and timestamp instead of the minimal 4-field form.
    pub forward_metadata: bool,
}

/// Subscriber socket and filtering options.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SubscriberSettings {
    pub host: String,
    pub port: u16,
    /// Last port tried when `port` is already taken.
    pub port_scan_end: u16,
    pub ack_retry_interval_ms: u64,
    pub max_ack_retries: u32,
    /// Empty means no keyword filter.
    pub filter_keyword: String,
    pub high_priority_only: bool,
    /// 0 disables the staleness filter.
    pub time_limit_secs: u64,
    /// 0 disables periodic re-registration.
    pub resubscribe_interval_ms: u64,
}

/// Publisher retry policy and outbound filter.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PublisherSettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub filter_keyword: String,
    pub enable_filtering: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            endpoint_lease_secs: 0,
            ack_relay_ttl_ms: 30_000,
            forward_metadata: false,
        }
    }
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5005,
            port_scan_end: 5010,
            ack_retry_interval_ms: 1000,
            max_ack_retries: 5,
            filter_keyword: String::new(),
            high_priority_only: false,
            time_limit_secs: 0,
            resubscribe_interval_ms: 0,
        }
    }
}

impl Default for PublisherSettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay_ms: 2000,
            filter_keyword: "goal".to_string(),
            enable_filtering: true,
        }
    }
}

impl RegistrySettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint_lease(&self) -> Option<Duration> {
        (self.endpoint_lease_secs > 0).then(|| Duration::from_secs(self.endpoint_lease_secs))
    }

    pub fn ack_relay_ttl(&self) -> Duration {
        Duration::from_millis(self.ack_relay_ttl_ms)
    }
}

impl SubscriberSettings {
    pub fn keyword(&self) -> Option<String> {
        let keyword = self.filter_keyword.trim();
        (!keyword.is_empty()).then(|| keyword.to_string())
    }

    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_secs > 0).then(|| Duration::from_secs(self.time_limit_secs))
    }

    pub fn ack_retry_interval(&self) -> Duration {
        Duration::from_millis(self.ack_retry_interval_ms.max(1))
    }

    pub fn resubscribe_interval(&self) -> Option<Duration> {
        (self.resubscribe_interval_ms > 0)
            .then(|| Duration::from_millis(self.resubscribe_interval_ms))
    }
}

impl PublisherSettings {
    /// The outbound keyword, only when filtering is switched on.
    pub fn active_keyword(&self) -> Option<String> {
        (self.enable_filtering && !self.filter_keyword.is_empty())
            .then(|| self.filter_keyword.clone())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
