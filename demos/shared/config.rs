use std::env;

use uuid::Uuid;
use wost_hub_client::ConnectionSettings;

/// Broker connection settings for the demos
///
/// `MQTT_BROKER` holds `host:port` and defaults to `localhost:1883`.
/// `MQTT_CA_CERT` optionally names a CA file, which switches to TLS.
pub fn broker_settings() -> ConnectionSettings {
	let address =
		env::var("MQTT_BROKER").unwrap_or_else(|_| "localhost:1883".to_string());
	let (host, port) = match address.rsplit_once(':') {
		| Some((host, port)) => (host.to_string(), port.parse().unwrap_or(1883)),
		| None => (address, 1883),
	};

	let settings = ConnectionSettings::new(host, port);
	match env::var("MQTT_CA_CERT") {
		| Ok(ca_file) => settings.with_ca_cert(ca_file),
		| Err(_) => settings,
	}
}

/// Thing IDs with a random suffix, so parallel demo runs do not collide
///
/// `unique_id("sensor")` gives something like `"sensor-a1b2c3d4"`.
pub fn unique_id(prefix: &str) -> String {
	let uuid = Uuid::new_v4().to_string();
	format!("{prefix}-{}", &uuid[..8])
}
