//! # WoST Hub Client
//!
//! A resilient MQTT publish/subscribe layer for talking to a WoST hub.
//! Things publish their descriptions, property values and events; consumers
//! subscribe to them and send actions and configuration requests back.
//!
//! ## Features
//!
//! - **Typed messages**: one document type per message kind, plain JSON on the wire
//! - **Durable subscriptions**: registered once, replayed after every (re)connect
//! - **Auto-reconnect**: dropped connections come back with bounded backoff
//! - **Password or client certificate authentication**, with TLS
//! - **Connection state notifications** through a `tokio::sync::watch` channel
//!
//! ## Topic layout
//!
//! Every message lives on `things/<thingID>/<kind>` where kind is one of
//! `td`, `values`, `event`, `action` or `config`. Subscribing with an empty
//! thing ID uses the `+` wildcard and receives messages for all things.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wost_hub_client::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = ConnectionSettings::new("localhost", 1883);
//!     let client = HubClient::for_consumer(settings, "consumer1", "secret");
//!
//!     // Subscriptions made before start are sent once connected
//!     client.subscribe_to_events("", |thing_id, event: ThingEvent| {
//!         println!("{thing_id}: {event:?}");
//!     })?;
//!
//!     client.start().await?;
//!     client
//!         .publish_event("thing1", &ThingEvent::new().with("alarm", true))
//!         .await?;
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Handlers
//!
//! Handlers run on the connection's event loop task. They must not block;
//! use [`ConnectionManager::try_publish`] or spawn a task to react to a
//! message with more I/O.

pub mod client;
pub mod hub;
pub mod message_serializer;
pub mod routing;
pub mod topic;

// === Core Public API ===
pub use client::{
	AuthMethod, ConnectionManager, ConnectionSettings, ConnectionState,
	Credential, HubConfig, TlsSettings,
};
pub use hub::{
	ActionRequest, ActionRequests, ConfigRequest, HubClient, HubClientError,
	HubMessage, HubPayload, JsonObject, PropertyValues, ThingDescription,
	ThingEvent,
};
pub use message_serializer::{JsonSerializer, MessageSerializer};
pub use routing::{HandlerId, MessageHandler};
pub use topic::{MessageKind, thing_topic};

/// Result type alias for operations that may fail with HubClientError
pub type Result<T> = std::result::Result<T, HubClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use wost_hub_client::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most hub applications

	pub use crate::{
		ActionRequest, ConfigRequest, ConnectionSettings, ConnectionState,
		HubClient, HubClientError, HubConfig, MessageKind, PropertyValues,
		Result, ThingDescription, ThingEvent,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use wost_hub_client::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::HubClientError;
	pub use crate::client::{ConnectError, CredentialError, PublishError};
	pub use crate::routing::SubscriptionError;
	pub use crate::topic::{
		TopicMatcherError, TopicParseError, TopicPatternError,
	};
}
