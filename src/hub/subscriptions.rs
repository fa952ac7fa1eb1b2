//! Per-subscription adapters between raw MQTT messages and typed handlers.
//!
//! Every subscription is its own value holding its handler and decoder, so
//! subscriptions created in a loop never share state. The thing ID always
//! comes from the topic the message arrived on, never from the pattern.

use std::marker::PhantomData;

use tracing::{debug, warn};

use super::messages::{ActionRequest, ActionRequests, HubPayload};
use crate::message_serializer::{JsonSerializer, MessageSerializer};
use crate::routing::MessageHandler;
use crate::topic::split_topic;

/// Decodes payloads into `M` and hands them to `handler` with the thing ID
pub struct TypedSubscription<M, H, F = JsonSerializer> {
	handler: H,
	serializer: F,
	_message: PhantomData<fn() -> M>,
}

impl<M, H, F> TypedSubscription<M, H, F>
where
	M: HubPayload,
	H: Fn(&str, M) + Send + Sync + 'static,
	F: MessageSerializer<M>,
{
	pub fn new(handler: H, serializer: F) -> Self {
		Self {
			handler,
			serializer,
			_message: PhantomData,
		}
	}
}

impl<M, H, F> MessageHandler for TypedSubscription<M, H, F>
where
	M: HubPayload,
	H: Fn(&str, M) + Send + Sync + 'static,
	F: MessageSerializer<M>,
{
	fn on_message(&self, topic: &str, payload: &[u8]) {
		let Some((thing_id, _)) = split_topic(topic) else {
			warn!(topic = %topic, kind = %M::KIND, "Dropping message on malformed topic");
			return;
		};
		match self.serializer.deserialize(payload) {
			| Ok(message) => (self.handler)(thing_id, message),
			| Err(err) => {
				warn!(
					topic = %topic,
					kind = %M::KIND,
					error = %err,
					"Dropping message that is not a valid JSON document"
				);
			}
		}
	}
}

/// Splits an action document and calls `handler` once per requested action
pub struct ActionSubscription<H, F = JsonSerializer> {
	handler: H,
	serializer: F,
}

impl<H, F> ActionSubscription<H, F>
where
	H: Fn(&str, ActionRequest) + Send + Sync + 'static,
	F: MessageSerializer<ActionRequests>,
{
	pub fn new(handler: H, serializer: F) -> Self {
		Self {
			handler,
			serializer,
		}
	}
}

impl<H, F> MessageHandler for ActionSubscription<H, F>
where
	H: Fn(&str, ActionRequest) + Send + Sync + 'static,
	F: MessageSerializer<ActionRequests>,
{
	fn on_message(&self, topic: &str, payload: &[u8]) {
		let Some((thing_id, _)) = split_topic(topic) else {
			warn!(topic = %topic, "Dropping action on malformed topic");
			return;
		};
		match self.serializer.deserialize(payload) {
			| Ok(actions) => {
				debug!(topic = %topic, count = actions.len(), "Action requests received");
				for request in actions.requests() {
					(self.handler)(thing_id, request);
				}
			}
			| Err(err) => {
				warn!(
					topic = %topic,
					error = %err,
					"Dropping action message that is not a valid action document"
				);
			}
		}
	}
}

/// Passes every message kind through undecoded as
/// `(thing_id, kind, payload)`
pub struct CatchAllSubscription<H> {
	handler: H,
}

impl<H> CatchAllSubscription<H>
where H: Fn(&str, &str, &[u8]) + Send + Sync + 'static
{
	pub fn new(handler: H) -> Self {
		Self { handler }
	}
}

impl<H> MessageHandler for CatchAllSubscription<H>
where H: Fn(&str, &str, &[u8]) + Send + Sync + 'static
{
	fn on_message(&self, topic: &str, payload: &[u8]) {
		match split_topic(topic) {
			| Some((thing_id, kind)) => (self.handler)(thing_id, kind, payload),
			| None => {
				debug!(topic = %topic, "Dropping message on topic with fewer than three segments");
			}
		}
	}
}
