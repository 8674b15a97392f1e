//! The registry is the only component with global routing state: it tracks
//! which endpoints want which topics and fans every PUBLISH out to them.

pub mod directory;
pub mod engine;
pub mod server;

pub use directory::{EndpointDirectory, SubscriberEndpoint};
pub use engine::{Outbound, Registry};
pub use server::{RegistryServer, start_registry_server};
