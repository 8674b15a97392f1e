//! The `subscriber` module receives topic messages relayed by the registry,
//! filters them locally and acknowledges what it accepts.

pub mod filter;
pub mod pending;
pub mod subscriber;

pub use filter::{SubscriptionFilter, Verdict};
pub use pending::{PendingAck, PendingAcks, RetryCycle, Track};
pub use subscriber::{Subscriber, SubscriberOptions};
