//! Hub client façade
//!
//! Typed publish and subscribe operations for Thing descriptions, property
//! values, events, actions and configuration requests, on top of the
//! connection manager.

/// Façade error types
pub mod error;
pub mod hub_client;
pub mod messages;
pub mod subscriptions;

pub use error::HubClientError;
pub use hub_client::HubClient;
pub use messages::{
	ActionRequest, ActionRequests, ConfigRequest, HubMessage, HubPayload,
	JsonObject, PropertyValues, ThingDescription, ThingEvent,
};
pub use subscriptions::{
	ActionSubscription, CatchAllSubscription, TypedSubscription,
};
