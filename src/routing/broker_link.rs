use rumqttc::{AsyncClient, ClientError, QoS};

/// Broker-side half of a subscription.
///
/// The registry tracks what the application wants to hear about; a
/// `BrokerLink` mirrors that onto the live connection. Calls must not block
/// because they are issued from the event loop task during replay.
pub trait BrokerLink {
	fn subscribe(&self, pattern: &str) -> Result<(), ClientError>;
	fn unsubscribe(&self, pattern: &str) -> Result<(), ClientError>;
}

impl BrokerLink for AsyncClient {
	fn subscribe(&self, pattern: &str) -> Result<(), ClientError> {
		self.try_subscribe(pattern, QoS::AtLeastOnce)
	}

	fn unsubscribe(&self, pattern: &str) -> Result<(), ClientError> {
		self.try_unsubscribe(pattern)
	}
}
