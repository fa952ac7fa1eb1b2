use thiserror::Error;

use crate::client::{ConnectError, CredentialError, PublishError};
use crate::routing::SubscriptionError;

/// Errors surfaced by [`HubClient`](super::HubClient)
#[derive(Debug, Error)]
pub enum HubClientError {
	#[error("Credential error: {0}")]
	Credential(#[from] CredentialError),
	#[error("Connect failed: {0}")]
	Connect(#[from] ConnectError),
	#[error("Publish failed: {0}")]
	Publish(#[from] PublishError),
	#[error("Subscription error: {0}")]
	Subscription(#[from] SubscriptionError),
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// Publishing needs one concrete thing
	#[error("Invalid thing ID for publishing: '{0}'")]
	InvalidThingId(String),
}
