//! Configuration for the hub connection

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Seconds a connect call keeps retrying when nothing else is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;
/// Upper bound of the delay between two automatic reconnect attempts
pub const DEFAULT_MAX_RECONNECT_INTERVAL_SECS: u64 = 60;
/// Port for client-certificate authentication
pub const DEFAULT_CERT_PORT: u16 = 8884;
/// Port for username/password authentication
pub const DEFAULT_PASSWORD_PORT: u16 = 8883;

pub const CA_CERT_FILE: &str = "ca.crt";
pub const CLIENT_CERT_FILE: &str = "client.crt";
pub const CLIENT_KEY_FILE: &str = "client.key";

/// TLS related settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSettings {
	/// CA certificate used to verify the broker. Without it a password
	/// connection falls back to plain TCP.
	pub ca_cert_file: Option<PathBuf>,
}

/// Everything the connection manager needs to reach the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
	pub host: String,
	pub port: u16,
	/// How long `connect` keeps retrying. Zero retries forever.
	pub connect_timeout_secs: u64,
	/// Upper bound for a single attempt to receive the broker's ConnAck
	pub handshake_timeout_secs: u64,
	pub keep_alive_secs: u64,
	pub max_reconnect_interval_secs: u64,
	/// Pause before the disconnect packet is sent on close, letting queued
	/// publishes drain
	pub close_grace_millis: u64,
	/// Capacity of the rumqttc request channel. Subscribe requests that do
	/// not fit are held back and sent as the event loop drains the channel.
	pub request_channel_capacity: usize,
	/// Speak MQTT over WebSocket, `ws://` or `wss://` depending on TLS
	pub websocket: bool,
	pub tls: TlsSettings,
}

impl Default for ConnectionSettings {
	fn default() -> Self {
		Self {
			host: "localhost".to_string(),
			port: 1883,
			connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
			handshake_timeout_secs: 10,
			keep_alive_secs: 10,
			max_reconnect_interval_secs: DEFAULT_MAX_RECONNECT_INTERVAL_SECS,
			close_grace_millis: 100,
			request_channel_capacity: 1024,
			websocket: false,
			tls: TlsSettings::default(),
		}
	}
}

impl ConnectionSettings {
	/// Settings for `host:port` with every other value at its default
	///
	/// # Example
	/// ```rust
	/// use wost_hub_client::ConnectionSettings;
	///
	/// let settings = ConnectionSettings::new("hub.local", 8883)
	///     .with_ca_cert("/etc/wost/certs/ca.crt");
	/// assert_eq!(settings.connect_timeout().as_secs(), 3);
	/// ```
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
			..Self::default()
		}
	}

	/// Plain TCP on localhost:1883, handy for local test brokers
	pub fn localhost() -> Self {
		Self::default()
	}

	pub fn with_ca_cert(mut self, ca_cert_file: impl Into<PathBuf>) -> Self {
		self.tls.ca_cert_file = Some(ca_cert_file.into());
		self
	}

	pub fn over_websocket(mut self) -> Self {
		self.websocket = true;
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout_secs = timeout.as_secs();
		self
	}

	pub fn connect_timeout(&self) -> Duration {
		Duration::from_secs(self.connect_timeout_secs)
	}

	pub fn handshake_timeout(&self) -> Duration {
		Duration::from_secs(self.handshake_timeout_secs)
	}

	pub fn keep_alive(&self) -> Duration {
		Duration::from_secs(self.keep_alive_secs)
	}

	pub fn max_reconnect_interval(&self) -> Duration {
		Duration::from_secs(self.max_reconnect_interval_secs)
	}

	pub fn close_grace(&self) -> Duration {
		Duration::from_millis(self.close_grace_millis)
	}

	/// `host:port` as used in log lines
	pub fn address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}

	/// Broker address handed to rumqttc. WebSocket transports take the full
	/// URL, TCP transports only the host.
	pub fn broker_address(&self) -> String {
		if !self.websocket {
			return self.host.clone();
		}
		let scheme = match self.tls.ca_cert_file {
			| Some(_) => "wss",
			| None => "ws",
		};
		format!("{scheme}://{}:{}/", self.host, self.port)
	}
}

/// Subset of the hub configuration file used by hub clients.
///
/// Field names follow the hub's YAML keys; any serde format can feed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubConfig {
	/// Hostname or IP of the message bus
	pub mqtt_address: String,
	pub mqtt_cert_port: u16,
	#[serde(rename = "mqttUnpwPortWS")]
	pub mqtt_unpw_port_ws: u16,
	/// Connection timeout in seconds, 0 for indefinite
	pub mqtt_timeout: u64,
	pub certs_folder: PathBuf,
}

impl Default for HubConfig {
	fn default() -> Self {
		Self {
			mqtt_address: "localhost".to_string(),
			mqtt_cert_port: DEFAULT_CERT_PORT,
			mqtt_unpw_port_ws: DEFAULT_PASSWORD_PORT,
			mqtt_timeout: DEFAULT_TIMEOUT_SECS,
			certs_folder: PathBuf::from("./certs"),
		}
	}
}

impl HubConfig {
	/// Makes a relative certificates folder absolute against `home`
	pub fn resolve_paths(&mut self, home: &Path) {
		if self.certs_folder.is_relative() {
			self.certs_folder = home.join(&self.certs_folder);
		}
	}

	pub fn ca_cert_path(&self) -> PathBuf {
		self.certs_folder.join(CA_CERT_FILE)
	}

	pub fn client_cert_path(&self) -> PathBuf {
		self.certs_folder.join(CLIENT_CERT_FILE)
	}

	pub fn client_key_path(&self) -> PathBuf {
		self.certs_folder.join(CLIENT_KEY_FILE)
	}

	/// Connection to the certificate-authenticated port, verified by the
	/// hub's CA
	pub fn cert_connection_settings(&self) -> ConnectionSettings {
		ConnectionSettings {
			connect_timeout_secs: self.mqtt_timeout,
			..ConnectionSettings::new(&self.mqtt_address, self.mqtt_cert_port)
		}
		.with_ca_cert(self.ca_cert_path())
	}

	/// Connection to the username/password port, verified by the hub's CA.
	/// The hub serves this port over WebSocket.
	pub fn password_connection_settings(&self) -> ConnectionSettings {
		ConnectionSettings {
			connect_timeout_secs: self.mqtt_timeout,
			..ConnectionSettings::new(&self.mqtt_address, self.mqtt_unpw_port_ws)
		}
		.with_ca_cert(self.ca_cert_path())
		.over_websocket()
	}
}
