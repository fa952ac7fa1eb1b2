use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::HubClientError;
use super::messages::{
	ActionRequest, ActionRequests, ConfigRequest, HubPayload, JsonObject,
	PropertyValues, ThingDescription, ThingEvent,
};
use super::subscriptions::{
	ActionSubscription, CatchAllSubscription, TypedSubscription,
};
use crate::client::{AuthMethod, ConnectionManager, ConnectionSettings, HubConfig};
use crate::message_serializer::{JsonSerializer, MessageSerializer};
use crate::routing::HandlerId;
use crate::topic::{MessageKind, catch_all_pattern, thing_topic};
use crate::Result;

/// Typed publish/subscribe access to the hub's `things/<id>/<kind>`
/// namespace.
///
/// Subscriptions may be made before [`HubClient::start`]; they are sent to
/// the broker as soon as a connection exists and survive reconnects. An
/// empty thing ID in a subscribe call means every thing.
#[derive(Clone)]
pub struct HubClient {
	connection: ConnectionManager,
	auth: AuthMethod,
	serializer: JsonSerializer,
}

impl HubClient {
	pub fn new(settings: ConnectionSettings, auth: AuthMethod) -> Self {
		Self {
			connection: ConnectionManager::new(settings),
			auth,
			serializer: JsonSerializer,
		}
	}

	/// Client for consumers, which log in with username and password
	pub fn for_consumer(
		settings: ConnectionSettings,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self::new(settings, AuthMethod::Password {
			username: username.into(),
			password: password.into(),
		})
	}

	/// Client for devices, which authenticate with a client certificate
	/// issued for `device_id`
	pub fn for_device(
		settings: ConnectionSettings,
		device_id: impl Into<String>,
		cert_file: impl Into<PathBuf>,
		key_file: impl Into<PathBuf>,
	) -> Self {
		Self::new(settings, AuthMethod::ClientCertificate {
			identity: device_id.into(),
			cert_file: cert_file.into(),
			key_file: key_file.into(),
		})
	}

	/// Client for hub plugins, using the certificates and certificate port
	/// from the hub configuration
	pub fn for_plugin(plugin_id: impl Into<String>, config: &HubConfig) -> Self {
		Self::new(config.cert_connection_settings(), AuthMethod::ClientCertificate {
			identity: plugin_id.into(),
			cert_file: config.client_cert_path(),
			key_file: config.client_key_path(),
		})
	}

	pub fn connection(&self) -> &ConnectionManager {
		&self.connection
	}

	/// Loads the credential and connects, retrying within the configured
	/// connect timeout
	pub async fn start(&self) -> Result<()> {
		let credential = self.auth.resolve()?;
		let timeout = self.connection.settings().connect_timeout();
		info!(identity = %self.auth.identity(), "Starting hub client");
		self.connection.connect(&credential, timeout).await?;
		Ok(())
	}

	/// Closes the connection, keeping every subscription for a later start
	pub async fn stop(&self) {
		info!(identity = %self.auth.identity(), "Stopping hub client");
		self.connection.close().await;
	}

	pub async fn publish_td(
		&self,
		thing_id: &str,
		td: &ThingDescription,
	) -> Result<()> {
		self.publish_document(thing_id, td).await
	}

	pub async fn publish_property_values(
		&self,
		thing_id: &str,
		values: &PropertyValues,
	) -> Result<()> {
		self.publish_document(thing_id, values).await
	}

	pub async fn publish_event(
		&self,
		thing_id: &str,
		event: &ThingEvent,
	) -> Result<()> {
		self.publish_document(thing_id, event).await
	}

	/// Requests action `name` on a thing, sent as `{"<name>": input}`
	pub async fn publish_action(
		&self,
		thing_id: &str,
		name: &str,
		input: JsonObject,
	) -> Result<()> {
		let actions = ActionRequests::single(ActionRequest::new(name, input));
		self.publish_document(thing_id, &actions).await
	}

	pub async fn publish_config_request(
		&self,
		thing_id: &str,
		config: &ConfigRequest,
	) -> Result<()> {
		self.publish_document(thing_id, config).await
	}

	async fn publish_document<M: HubPayload>(
		&self,
		thing_id: &str,
		document: &M,
	) -> Result<()> {
		validate_thing_id(thing_id)?;
		let payload = self
			.serializer
			.serialize(document)
			.map_err(|err| HubClientError::Serialization(err.to_string()))?;
		let topic = thing_topic(thing_id, M::KIND);
		debug!(topic = %topic, payload_size = payload.len(), "Publishing hub message");
		self.connection.publish(&topic, payload).await?;
		Ok(())
	}

	pub fn subscribe_to_td<H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where H: Fn(&str, ThingDescription) + Send + Sync + 'static
	{
		self.subscribe_document(thing_id, handler)
	}

	pub fn subscribe_to_property_values<H>(
		&self,
		thing_id: &str,
		handler: H,
	) -> Result<HandlerId>
	where
		H: Fn(&str, PropertyValues) + Send + Sync + 'static,
	{
		self.subscribe_document(thing_id, handler)
	}

	pub fn subscribe_to_events<H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where H: Fn(&str, ThingEvent) + Send + Sync + 'static
	{
		self.subscribe_document(thing_id, handler)
	}

	/// `handler` runs once for every action in a received action document
	pub fn subscribe_to_actions<H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where H: Fn(&str, ActionRequest) + Send + Sync + 'static
	{
		let topic = thing_topic(thing_id, MessageKind::Action);
		let subscription = ActionSubscription::new(handler, self.serializer);
		Ok(self.connection.subscribe(&topic, Arc::new(subscription))?)
	}

	pub fn subscribe_to_config<H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where H: Fn(&str, ConfigRequest) + Send + Sync + 'static
	{
		self.subscribe_document(thing_id, handler)
	}

	fn subscribe_document<M, H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where
		M: HubPayload,
		H: Fn(&str, M) + Send + Sync + 'static,
	{
		let topic = thing_topic(thing_id, M::KIND);
		let subscription = TypedSubscription::new(handler, self.serializer);
		Ok(self.connection.subscribe(&topic, Arc::new(subscription))?)
	}

	/// Receives every message kind for a thing as
	/// `(thing_id, kind, raw_payload)`, without decoding
	pub fn subscribe<H>(&self, thing_id: &str, handler: H) -> Result<HandlerId>
	where H: Fn(&str, &str, &[u8]) + Send + Sync + 'static
	{
		let pattern = catch_all_pattern(thing_id);
		let subscription = CatchAllSubscription::new(handler);
		Ok(self.connection.subscribe(&pattern, Arc::new(subscription))?)
	}

	/// Drops every handler of the catch-all subscription for `thing_id`.
	/// Returns false when there was none.
	pub fn unsubscribe(&self, thing_id: &str) -> bool {
		self.connection.unsubscribe(&catch_all_pattern(thing_id))
	}

	/// Drops every handler of one typed subscription
	pub fn unsubscribe_from(&self, thing_id: &str, kind: MessageKind) -> bool {
		self.connection.unsubscribe(&thing_topic(thing_id, kind))
	}
}

fn validate_thing_id(thing_id: &str) -> Result<()> {
	if thing_id.is_empty() || thing_id.contains(['/', '+', '#']) {
		return Err(HubClientError::InvalidThingId(thing_id.to_string()));
	}
	Ok(())
}
