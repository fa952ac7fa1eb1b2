//! Broker connection module
//!
//! Owns the physical MQTT connection: configuration, credentials and the
//! transport they imply, connect with retry, automatic reconnect with
//! subscription replay, publishing and shutdown.

pub mod config;
/// Connection manager with retrying connect and auto-reconnect
pub mod connection_manager;
pub mod credentials;
/// Client error types
pub mod error;
pub mod state;

pub use config::{ConnectionSettings, HubConfig, TlsSettings};
pub use connection_manager::ConnectionManager;
pub use credentials::{AuthMethod, Credential};
pub use error::{ConnectError, CredentialError, PublishError};
pub use state::ConnectionState;
