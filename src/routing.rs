//! Message routing and subscription bookkeeping
//!
//! The registry remembers every pattern the application asked for, mirrors
//! it onto the broker while a connection exists, and fans incoming messages
//! out to the handlers registered for matching patterns.

/// Broker-side subscription seam
pub mod broker_link;
/// Routing error types
pub mod error;
pub mod handler;
pub mod registry;

#[cfg(test)]
mod registry_tests;

pub use broker_link::BrokerLink;
pub use error::SubscriptionError;
pub use handler::{HandlerId, MessageHandler};
pub use registry::SubscriptionRegistry;
