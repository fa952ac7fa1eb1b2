use std::{
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use rumqttc::{
	AsyncClient, ConnectReturnCode, ConnectionError, EventLoop, MqttOptions,
	Outgoing, QoS,
	Event::{Incoming, Outgoing as Sent},
	Packet::{ConnAck, Disconnect, Publish},
};
use tokio::{sync::watch, task::JoinHandle, time};
use tracing::{debug, error, info, warn};

use super::config::ConnectionSettings;
use super::credentials::Credential;
use super::error::{ConnectError, PublishError};
use super::state::{ConnectionState, StateTracker};
use crate::routing::{
	BrokerLink, HandlerId, MessageHandler, SubscriptionError,
	SubscriptionRegistry,
};

/// Delay before the second connect attempt; each further attempt waits one
/// second longer.
const CONNECT_RETRY_STEP: Duration = Duration::from_secs(1);
const MAX_CONNECT_RETRY_DELAY: Duration = Duration::from_secs(120);
/// First backoff step of the automatic reconnect, doubled per failure
const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(100);
/// How long `close` waits for the event loop to flush the disconnect
const EVENT_LOOP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

struct Session {
	generation: u64,
	stop_tx: watch::Sender<bool>,
	event_loop: Option<JoinHandle<()>>,
}

impl Session {
	/// Stops the session without a graceful disconnect
	fn retire(self) {
		let _ = self.stop_tx.send(true);
		if let Some(handle) = self.event_loop {
			handle.abort();
		}
	}
}

#[derive(Default)]
struct Link {
	client: Option<AsyncClient>,
	client_id: Option<String>,
	session: Option<Session>,
}

struct Inner {
	settings: ConnectionSettings,
	registry: Arc<SubscriptionRegistry>,
	state: Arc<StateTracker>,
	link: Mutex<Link>,
	generation: AtomicU64,
}

impl Inner {
	fn link(&self) -> MutexGuard<'_, Link> {
		self.link.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		let link = self.link.get_mut().unwrap_or_else(PoisonError::into_inner);
		if let Some(session) = link.session.take() {
			error!(
				"ConnectionManager dropped without calling close(). Please \
				 call close() and await its completion before dropping."
			);
			session.retire();
		}
	}
}

/// Owns the single physical connection to the broker.
///
/// Reconnects on its own after a dropped connection and replays every
/// registered subscription each time the broker accepts a session, so
/// handlers keep receiving messages across network blips.
///
/// Cloning is cheap; clones share the connection and registry.
#[derive(Clone)]
pub struct ConnectionManager {
	inner: Arc<Inner>,
}

impl ConnectionManager {
	pub fn new(settings: ConnectionSettings) -> Self {
		Self {
			inner: Arc::new(Inner {
				settings,
				registry: Arc::new(SubscriptionRegistry::new()),
				state: Arc::new(StateTracker::new()),
				link: Mutex::new(Link::default()),
				generation: AtomicU64::new(0),
			}),
		}
	}

	pub fn settings(&self) -> &ConnectionSettings {
		&self.inner.settings
	}

	pub fn state(&self) -> ConnectionState {
		self.inner.state.get()
	}

	pub fn is_connected(&self) -> bool {
		self.inner.state.is_connected()
	}

	/// Receiver that observes every connection state transition
	pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state.subscribe()
	}

	/// Client id of the most recent connect call
	pub fn client_id(&self) -> Option<String> {
		self.inner.link().client_id.clone()
	}

	pub(crate) fn registry(&self) -> &SubscriptionRegistry {
		&self.inner.registry
	}

	fn connected_client(&self) -> Option<AsyncClient> {
		if !self.inner.state.is_connected() {
			return None;
		}
		self.inner.link().client.clone()
	}

	/// Connects to the broker, retrying until `timeout` has passed.
	///
	/// An existing connection is closed first. Failed attempts are retried
	/// after 1s, 2s, 3s and so on, capped at 120s; a zero `timeout` retries
	/// forever. When the window is exhausted the error of the last attempt is
	/// returned. [`ConnectionManager::close`] interrupts the retry loop.
	pub async fn connect(
		&self,
		credential: &Credential,
		timeout: Duration,
	) -> Result<(), ConnectError> {
		self.close().await;

		let settings = &self.inner.settings;
		let transport = credential.transport(settings)?;
		let client_id = generate_client_id(credential.identity());

		let mut options = MqttOptions::new(
			client_id.clone(),
			settings.broker_address(),
			settings.port,
		);
		options.set_keep_alive(settings.keep_alive());
		options.set_clean_session(true);
		if let Some((username, password)) = credential.login() {
			options.set_credentials(username, password);
		}
		options.set_transport(transport);

		let (client, mut event_loop) =
			AsyncClient::new(options, settings.request_channel_capacity);
		let (stop_tx, mut stop_rx) = watch::channel(false);
		let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let stale = {
			let mut link = self.inner.link();
			link.client = Some(client.clone());
			link.client_id = Some(client_id.clone());
			link.session.replace(Session {
				generation,
				stop_tx,
				event_loop: None,
			})
		};
		if let Some(stale) = stale {
			warn!(
				generation = stale.generation,
				"Stopping session left by a concurrent connect"
			);
			stale.retire();
		}
		self.inner.state.set(ConnectionState::Connecting);

		let started = Instant::now();
		let mut attempt: u32 = 0;
		loop {
			attempt += 1;
			info!(
				client_id = %client_id,
				address = %settings.address(),
				attempt,
				"Connecting to MQTT broker"
			);
			let result = tokio::select! {
				result = establish(&mut event_loop, settings.handshake_timeout()) => result,
				_ = stop_rx.changed() => return Err(self.abandon(generation)),
			};
			let Err(err) = result else { break };

			let retry_delay = connect_retry_delay(attempt);
			if !timeout.is_zero() && started.elapsed() + retry_delay > timeout {
				error!(
					client_id = %client_id,
					attempt,
					error = %err,
					"Giving up connecting to MQTT broker"
				);
				self.abandon(generation);
				return Err(err);
			}
			warn!(
				client_id = %client_id,
				attempt,
				delay = ?retry_delay,
				error = %err,
				"Connect attempt failed, retrying"
			);
			tokio::select! {
				_ = time::sleep(retry_delay) => {}
				_ = stop_rx.changed() => return Err(self.abandon(generation)),
			}
		}

		{
			let mut link = self.inner.link();
			let Some(session) = link
				.session
				.as_mut()
				.filter(|session| session.generation == generation)
			else {
				return Err(ConnectError::Cancelled);
			};
			self.inner.state.set(ConnectionState::Connected);
			info!(
				client_id = %client_id,
				elapsed = ?started.elapsed(),
				"Connected to MQTT broker"
			);

			// Running before the replay, so the request channel drains
			let context = EventLoopContext {
				client: client.clone(),
				registry: Arc::clone(&self.inner.registry),
				state: Arc::clone(&self.inner.state),
				max_reconnect_interval: settings.max_reconnect_interval(),
			};
			session.event_loop =
				Some(tokio::spawn(context.run(event_loop, stop_rx)));
		}
		self.inner.registry.replay_all(&client);
		Ok(())
	}

	/// Drops a session that never finished connecting
	fn abandon(&self, generation: u64) -> ConnectError {
		let mut link = self.inner.link();
		if link
			.session
			.as_ref()
			.is_some_and(|session| session.generation == generation)
		{
			link.session = None;
			link.client = None;
			self.inner.state.set(ConnectionState::Disconnected);
		}
		ConnectError::Cancelled
	}

	/// Stops the connection for good.
	///
	/// Automatic reconnect is disabled first, then queued publishes get a
	/// short grace period before the disconnect is sent. Logical
	/// subscriptions stay registered and are replayed by the next
	/// [`ConnectionManager::connect`].
	pub async fn close(&self) {
		let (session, client) = {
			let mut link = self.inner.link();
			(link.session.take(), link.client.take())
		};
		let Some(mut session) = session else {
			return;
		};
		let _ = session.stop_tx.send(true);

		if let Some(mut handle) = session.event_loop.take() {
			time::sleep(self.inner.settings.close_grace()).await;
			if let Some(client) = client {
				if let Err(err) = client.try_disconnect() {
					debug!(error = ?err, "Disconnect request not queued");
				}
			}
			match time::timeout(EVENT_LOOP_SHUTDOWN_TIMEOUT, &mut handle).await {
				| Ok(Ok(())) => {}
				| Ok(Err(err)) => warn!(error = %err, "Event loop task failed"),
				| Err(_) => {
					warn!(
						timeout = ?EVENT_LOOP_SHUTDOWN_TIMEOUT,
						"Event loop did not stop in time, aborting"
					);
					handle.abort();
				}
			}
		}

		self.inner.registry.clear_broker_state();
		self.inner.state.set(ConnectionState::Disconnected);
		info!("MQTT connection closed");
	}

	/// Publishes `payload` to `topic` with at-least-once delivery.
	///
	/// Fails fast with [`PublishError::NotConnected`] while there is no live
	/// connection. Nothing is queued for later.
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
	) -> Result<(), PublishError> {
		let client = self.connected_client().ok_or(PublishError::NotConnected)?;
		client
			.publish_bytes(topic, QoS::AtLeastOnce, false, payload.into())
			.await
			.inspect_err(|err| {
				error!(topic = %topic, error = ?err, "Failed to publish");
			})?;
		Ok(())
	}

	/// Non-blocking variant of [`ConnectionManager::publish`], usable from
	/// inside a message handler
	pub fn try_publish(
		&self,
		topic: &str,
		payload: impl Into<Vec<u8>>,
	) -> Result<(), PublishError> {
		let client = self.connected_client().ok_or(PublishError::NotConnected)?;
		client.try_publish(topic, QoS::AtLeastOnce, false, payload)?;
		Ok(())
	}

	/// Registers `handler` for `pattern`. While connected the broker
	/// subscription is issued immediately, otherwise on the next connect.
	pub fn subscribe(
		&self,
		pattern: &str,
		handler: Arc<dyn MessageHandler>,
	) -> Result<HandlerId, SubscriptionError> {
		let client = self.connected_client();
		let link = client.as_ref().map(|client| client as &dyn BrokerLink);
		self.inner.registry.subscribe(pattern, handler, link)
	}

	/// Removes every handler registered for `pattern`
	pub fn unsubscribe(&self, pattern: &str) -> bool {
		let client = self.connected_client();
		let link = client.as_ref().map(|client| client as &dyn BrokerLink);
		self.inner.registry.unsubscribe(pattern, link)
	}
}

/// Polls until the broker answers the CONNECT packet
async fn establish(
	event_loop: &mut EventLoop,
	handshake_timeout: Duration,
) -> Result<(), ConnectError> {
	let handshake = async {
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(ConnAck(ack))) => {
					return match ack.code {
						| ConnectReturnCode::Success => Ok(()),
						| code => Err(ConnectError::BrokerRejected { code }),
					};
				}
				| Ok(event) => debug!(event = ?event, "Event before ConnAck"),
				| Err(ConnectionError::ConnectionRefused(code)) => {
					return Err(ConnectError::BrokerRejected { code });
				}
				| Err(err) => return Err(ConnectError::Network(err)),
			}
		}
	};
	time::timeout(handshake_timeout, handshake)
		.await
		.unwrap_or(Err(ConnectError::HandshakeTimeout(handshake_timeout)))
}

/// State shared with the spawned event loop task
struct EventLoopContext {
	client: AsyncClient,
	registry: Arc<SubscriptionRegistry>,
	state: Arc<StateTracker>,
	max_reconnect_interval: Duration,
}

impl EventLoopContext {
	/// Drives the connection after the first ConnAck.
	///
	/// Poll errors are retried with exponential backoff until `stop_rx`
	/// flips; the loop ends after the disconnect packet went out.
	async fn run(
		self,
		mut event_loop: EventLoop,
		mut stop_rx: watch::Receiver<bool>,
	) {
		let mut error_count: u32 = 0;
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Publish(p))) => {
					error_count = 0;
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
					self.registry.dispatch(&p.topic, &p.payload);
				}
				| Ok(Incoming(ConnAck(ack))) => {
					error_count = 0;
					if ack.code == ConnectReturnCode::Success {
						self.state.set(ConnectionState::Connected);
						info!("Reconnected to MQTT broker");
						self.registry.replay_all(&self.client);
					} else {
						warn!(code = ?ack.code, "Broker rejected reconnect");
					}
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
				}
				| Ok(Sent(Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					break;
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Received MQTT notification");
				}
				| Err(err) => {
					if *stop_rx.borrow() {
						debug!(error = %err, "Event loop error while stopping");
						break;
					}
					error_count += 1;
					self.state.set(ConnectionState::Disconnected);
					self.registry.clear_broker_state();
					error!(error_count, error = %err, "MQTT connection lost");

					let delay =
						reconnect_delay(error_count, self.max_reconnect_interval);
					warn!(delay = ?delay, error_count, "Reconnecting to MQTT broker");
					tokio::select! {
						_ = time::sleep(delay) => {}
						_ = stop_rx.changed() => break,
					}
					self.state.set(ConnectionState::Connecting);
					continue;
				}
			}
			// Each poll makes room in the request channel
			self.registry.flush_pending(&self.client);
		}
		self.state.set(ConnectionState::Disconnected);
		info!("MQTT event loop terminated");
	}
}

/// Wait after the `attempt`-th failed connect: 1s, 2s, 3s and so on,
/// capped at 120s
fn connect_retry_delay(attempt: u32) -> Duration {
	CONNECT_RETRY_STEP
		.saturating_mul(attempt)
		.min(MAX_CONNECT_RETRY_DELAY)
}

/// Wait after the `error_count`-th consecutive connection error, doubling
/// from 100ms up to `max`
fn reconnect_delay(error_count: u32, max: Duration) -> Duration {
	let doublings = error_count.saturating_sub(1).min(16);
	INITIAL_RECONNECT_DELAY
		.saturating_mul(1 << doublings)
		.min(max)
}

/// `<host>-<identity>-<unix millis>`, unique across restarts of the same
/// identity on the same host
fn generate_client_id(identity: &str) -> String {
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_millis())
		.unwrap_or_default();
	format!("{}-{}-{}", host_name(), identity, millis)
}

fn host_name() -> String {
	std::env::var("HOSTNAME")
		.ok()
		.or_else(|| std::fs::read_to_string("/etc/hostname").ok())
		.map(|name| name.trim().to_string())
		.filter(|name| !name.is_empty())
		.unwrap_or_else(|| "localhost".to_string())
}
