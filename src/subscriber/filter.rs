use std::time::Duration;

use crate::config::SubscriberSettings;
use crate::protocol::{Message, Priority};

/// Local acceptance rules applied to every PUBLISH a subscriber receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    /// Case-sensitive substring the content must contain.
    pub keyword: Option<String>,
    pub high_priority_only: bool,
    /// Maximum age, measured from the message's own send timestamp.
    pub time_limit: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Stale { age_ms: i64 },
    LowPriority,
    KeywordMismatch,
}

impl SubscriptionFilter {
    pub fn from_settings(settings: &SubscriberSettings) -> Self {
        Self {
            keyword: settings.keyword(),
            high_priority_only: settings.high_priority_only,
            time_limit: settings.time_limit(),
        }
    }

    pub fn keyword(mut self, keyword: &str) -> Self {
        self.keyword = Some(keyword.to_string());
        self
    }

    pub fn high_priority_only(mut self, on: bool) -> Self {
        self.high_priority_only = on;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Staleness first, then priority, then keyword.
    ///
    /// A message without a timestamp cannot be judged stale. A message
    /// without a priority is not HIGH.
    pub fn evaluate(&self, message: &Message, received_at_ms: i64) -> Verdict {
        if let (Some(limit), Some(age_ms)) = (self.time_limit, message.age_ms(received_at_ms)) {
            if age_ms as u128 > limit.as_millis() {
                return Verdict::Stale { age_ms };
            }
        }

        if self.high_priority_only && message.priority != Some(Priority::High) {
            return Verdict::LowPriority;
        }

        match &self.keyword {
            Some(keyword) if !message.content.contains(keyword.as_str()) => {
                Verdict::KeywordMismatch
            }
            _ => Verdict::Accept,
        }
    }
}
