use std::sync::{
	Arc, Mutex,
	atomic::{AtomicUsize, Ordering},
};

use rumqttc::{ClientError, QoS, Request, Subscribe};

use super::{BrokerLink, MessageHandler, SubscriptionError, SubscriptionRegistry};
use crate::topic::TopicPatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum LinkCall {
	Subscribe(String),
	Unsubscribe(String),
}

/// Records accepted requests. `room` models the bounded rumqttc request
/// channel: once it reaches zero every request is refused.
#[derive(Default)]
struct RecordingLink {
	calls: Mutex<Vec<LinkCall>>,
	room: Mutex<Option<usize>>,
}

impl RecordingLink {
	fn bounded(room: usize) -> Self {
		Self {
			room: Mutex::new(Some(room)),
			..Self::default()
		}
	}

	fn calls(&self) -> Vec<LinkCall> {
		self.calls.lock().unwrap().clone()
	}

	fn clear(&self) {
		self.calls.lock().unwrap().clear();
	}

	/// `None` accepts everything, `Some(0)` refuses everything
	fn set_room(&self, room: Option<usize>) {
		*self.room.lock().unwrap() = room;
	}

	fn record(&self, pattern: &str, call: LinkCall) -> Result<(), ClientError> {
		let mut room = self.room.lock().unwrap();
		if let Some(left) = room.as_mut() {
			if *left == 0 {
				return Err(ClientError::TryRequest(Request::Subscribe(
					Subscribe::new(pattern, QoS::AtLeastOnce),
				)));
			}
			*left -= 1;
		}
		self.calls.lock().unwrap().push(call);
		Ok(())
	}
}

impl BrokerLink for RecordingLink {
	fn subscribe(&self, pattern: &str) -> Result<(), ClientError> {
		self.record(pattern, LinkCall::Subscribe(pattern.to_string()))
	}

	fn unsubscribe(&self, pattern: &str) -> Result<(), ClientError> {
		self.record(pattern, LinkCall::Unsubscribe(pattern.to_string()))
	}
}

type Received = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

fn recorder() -> (Received, Arc<dyn MessageHandler>) {
	let received: Received = Arc::default();
	let sink = Arc::clone(&received);
	let handler = move |topic: &str, payload: &[u8]| {
		sink.lock().unwrap().push((topic.to_string(), payload.to_vec()));
	};
	(received, Arc::new(handler))
}

fn counter() -> (Arc<AtomicUsize>, Arc<dyn MessageHandler>) {
	let count = Arc::new(AtomicUsize::new(0));
	let sink = Arc::clone(&count);
	let handler = move |_: &str, _: &[u8]| {
		sink.fetch_add(1, Ordering::SeqCst);
	};
	(count, Arc::new(handler))
}

#[test]
fn test_fan_out_to_every_handler_of_a_pattern() {
	let registry = SubscriptionRegistry::new();
	let (first, first_handler) = recorder();
	let (second, second_handler) = recorder();

	registry
		.subscribe("things/thing1/event", first_handler, None)
		.unwrap();
	registry
		.subscribe("things/thing1/event", second_handler, None)
		.unwrap();

	let delivered = registry.dispatch("things/thing1/event", b"{}");
	assert_eq!(delivered, 2);
	assert_eq!(first.lock().unwrap().len(), 1);
	assert_eq!(second.lock().unwrap().len(), 1);
	assert_eq!(registry.handler_count("things/thing1/event"), 2);
}

#[test]
fn test_broker_subscribe_issued_once_per_pattern() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (_, h1) = counter();
	let (_, h2) = counter();

	registry.subscribe("things/+/td", h1, Some(&link)).unwrap();
	registry.subscribe("things/+/td", h2, Some(&link)).unwrap();

	assert_eq!(link.calls(), vec![LinkCall::Subscribe("things/+/td".into())]);
	assert!(registry.is_on_broker("things/+/td"));
}

#[test]
fn test_subscribe_while_disconnected_skips_broker() {
	let registry = SubscriptionRegistry::new();
	let (_, handler) = counter();

	registry.subscribe("things/thing1/values", handler, None).unwrap();

	assert!(registry.is_subscribed("things/thing1/values"));
	assert!(!registry.is_on_broker("things/thing1/values"));
}

#[test]
fn test_failed_broker_subscribe_keeps_handler() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::bounded(0);
	let (count, handler) = counter();

	registry.subscribe("things/thing1/td", handler, Some(&link)).unwrap();

	assert!(!registry.is_on_broker("things/thing1/td"));
	assert_eq!(registry.pending_count(), 1);
	assert_eq!(registry.dispatch("things/thing1/td", b"{}"), 1);
	assert_eq!(count.load(Ordering::SeqCst), 1);

	link.set_room(None);
	assert_eq!(registry.flush_pending(&link), 1);
	assert!(registry.is_on_broker("things/thing1/td"));
	assert_eq!(registry.pending_count(), 0);
	assert_eq!(link.calls(), vec![LinkCall::Subscribe("things/thing1/td".into())]);
}

#[test]
fn test_empty_pattern_rejected() {
	let registry = SubscriptionRegistry::new();
	let (_, handler) = counter();

	let result = registry.subscribe("", handler, None);
	assert_eq!(
		result,
		Err(SubscriptionError::InvalidPattern(TopicPatternError::EmptyPattern))
	);
}

#[test]
fn test_unsubscribe_removes_all_handlers() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (count, h1) = counter();
	let h2 = {
		let count = Arc::clone(&count);
		Arc::new(move |_: &str, _: &[u8]| {
			count.fetch_add(1, Ordering::SeqCst);
		}) as Arc<dyn MessageHandler>
	};
	registry.subscribe("things/thing1/event", h1, Some(&link)).unwrap();
	registry.subscribe("things/thing1/event", h2, Some(&link)).unwrap();
	link.clear();

	assert!(registry.unsubscribe("things/thing1/event", Some(&link)));

	assert_eq!(registry.dispatch("things/thing1/event", b"{}"), 0);
	assert_eq!(count.load(Ordering::SeqCst), 0);
	assert_eq!(registry.handler_count("things/thing1/event"), 0);
	assert!(registry.patterns().is_empty());
	assert_eq!(
		link.calls(),
		vec![LinkCall::Unsubscribe("things/thing1/event".into())]
	);
}

#[test]
fn test_unsubscribe_unknown_pattern_is_noop() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (count, handler) = counter();
	registry.subscribe("things/thing1/td", handler, None).unwrap();

	assert!(!registry.unsubscribe("things/thing2/td", Some(&link)));

	assert!(link.calls().is_empty());
	assert_eq!(registry.dispatch("things/thing1/td", b"{}"), 1);
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unsubscribe_leaves_overlapping_patterns() {
	let registry = SubscriptionRegistry::new();
	let (exact, exact_handler) = counter();
	let (wildcard, wildcard_handler) = counter();
	registry
		.subscribe("things/thing1/td", exact_handler, None)
		.unwrap();
	registry
		.subscribe("things/+/td", wildcard_handler, None)
		.unwrap();

	registry.unsubscribe("things/thing1/td", None);
	registry.dispatch("things/thing1/td", b"{}");

	assert_eq!(exact.load(Ordering::SeqCst), 0);
	assert_eq!(wildcard.load(Ordering::SeqCst), 1);
}

#[test]
fn test_wildcard_dispatch_reports_concrete_topic() {
	let registry = SubscriptionRegistry::new();
	let (received, handler) = recorder();
	registry.subscribe("things/#", handler, None).unwrap();

	registry.dispatch("things/thing1/values", b"{\"temp\":21}");
	registry.dispatch("things/thing2/event", b"{}");
	registry.dispatch("other/thing3/event", b"{}");

	let received = received.lock().unwrap();
	let topics: Vec<&str> = received.iter().map(|(t, _)| t.as_str()).collect();
	assert_eq!(topics, vec!["things/thing1/values", "things/thing2/event"]);
	assert_eq!(received[0].1, b"{\"temp\":21}".to_vec());
}

#[test]
fn test_loop_registration_keeps_each_topic() {
	let registry = SubscriptionRegistry::new();
	let received: Arc<Mutex<Vec<(usize, String)>>> = Arc::default();

	for index in 0..5 {
		let topic = format!("things/thing{index}/event");
		let sink = Arc::clone(&received);
		let handler = move |got: &str, _: &[u8]| {
			sink.lock().unwrap().push((index, got.to_string()));
		};
		registry.subscribe(&topic, Arc::new(handler), None).unwrap();
	}

	for index in 0..5 {
		registry.dispatch(&format!("things/thing{index}/event"), b"{}");
	}

	let received = received.lock().unwrap();
	assert_eq!(received.len(), 5);
	for (index, topic) in received.iter() {
		assert_eq!(topic, &format!("things/thing{index}/event"));
	}
}

#[test]
fn test_panicking_handler_does_not_stop_delivery() {
	let registry = SubscriptionRegistry::new();
	let (count, good) = counter();
	let bad = Arc::new(|_: &str, _: &[u8]| {
		panic!("handler failure");
	}) as Arc<dyn MessageHandler>;

	registry.subscribe("things/+/event", bad, None).unwrap();
	registry.subscribe("things/thing1/event", good, None).unwrap();

	assert_eq!(registry.dispatch("things/thing1/event", b"{}"), 2);
	assert_eq!(count.load(Ordering::SeqCst), 1);

	registry.dispatch("things/thing1/event", b"{}");
	assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[test]
fn test_handler_can_subscribe_during_dispatch() {
	let registry = Arc::new(SubscriptionRegistry::new());
	let (late, late_handler) = counter();

	let reentrant = {
		let registry = Arc::clone(&registry);
		let late_handler = Mutex::new(Some(late_handler));
		move |_: &str, _: &[u8]| {
			if let Some(handler) = late_handler.lock().unwrap().take() {
				registry
					.subscribe("things/thing1/values", handler, None)
					.unwrap();
			}
		}
	};
	registry
		.subscribe("things/thing1/td", Arc::new(reentrant), None)
		.unwrap();

	registry.dispatch("things/thing1/td", b"{}");
	registry.dispatch("things/thing1/values", b"{}");

	assert_eq!(late.load(Ordering::SeqCst), 1);
	assert_eq!(registry.patterns(), vec![
		"things/thing1/td".to_string(),
		"things/thing1/values".to_string()
	]);
}

#[test]
fn test_replay_unsubscribes_then_subscribes_every_pattern() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (_, h1) = counter();
	let (_, h2) = counter();
	let (_, h3) = counter();
	registry.subscribe("things/+/td", h1, None).unwrap();
	registry.subscribe("things/thing1/event", h2, None).unwrap();
	registry.subscribe("things/thing1/event", h3, None).unwrap();

	let replayed = registry.replay_all(&link);

	assert_eq!(replayed, 2);
	assert_eq!(link.calls(), vec![
		LinkCall::Unsubscribe("things/+/td".into()),
		LinkCall::Subscribe("things/+/td".into()),
		LinkCall::Unsubscribe("things/thing1/event".into()),
		LinkCall::Subscribe("things/thing1/event".into()),
	]);
	assert!(registry.is_on_broker("things/+/td"));
	assert!(registry.is_on_broker("things/thing1/event"));
}

#[test]
fn test_replay_survives_broker_state_reset() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (count, handler) = counter();
	registry
		.subscribe("things/thing1/values", handler, Some(&link))
		.unwrap();

	registry.clear_broker_state();
	assert!(!registry.is_on_broker("things/thing1/values"));
	assert!(registry.is_subscribed("things/thing1/values"));

	link.clear();
	assert_eq!(registry.replay_all(&link), 1);
	assert!(registry.is_on_broker("things/thing1/values"));
	assert_eq!(registry.dispatch("things/thing1/values", b"{}"), 1);
	assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_replay_with_rejecting_broker_keeps_registrations() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	let (_, handler) = counter();
	registry.subscribe("things/thing1/config", handler, None).unwrap();

	link.set_room(Some(0));
	assert_eq!(registry.replay_all(&link), 0);
	assert!(registry.is_subscribed("things/thing1/config"));

	link.set_room(None);
	assert_eq!(registry.replay_all(&link), 1);
}

fn register_things(registry: &SubscriptionRegistry, count: usize) {
	for index in 0..count {
		let (_, handler) = counter();
		registry
			.subscribe(&format!("things/thing{index}/event"), handler, None)
			.unwrap();
	}
}

#[test]
fn test_replay_larger_than_request_queue_completes_after_flush() {
	let registry = SubscriptionRegistry::new();
	register_things(&registry, 8);
	// Two requests per pattern: room for five patterns only
	let link = RecordingLink::bounded(10);

	assert_eq!(registry.replay_all(&link), 5);
	assert_eq!(registry.pending_count(), 3);
	for index in 5..8 {
		assert!(!registry.is_on_broker(&format!("things/thing{index}/event")));
	}

	// The event loop drains the queue and flushes again
	link.clear();
	link.set_room(Some(10));
	assert_eq!(registry.flush_pending(&link), 3);

	assert_eq!(registry.pending_count(), 0);
	for index in 0..8 {
		assert!(registry.is_on_broker(&format!("things/thing{index}/event")));
	}
	assert_eq!(link.calls(), vec![
		LinkCall::Unsubscribe("things/thing5/event".into()),
		LinkCall::Subscribe("things/thing5/event".into()),
		LinkCall::Unsubscribe("things/thing6/event".into()),
		LinkCall::Subscribe("things/thing6/event".into()),
		LinkCall::Unsubscribe("things/thing7/event".into()),
		LinkCall::Subscribe("things/thing7/event".into()),
	]);
}

#[test]
fn test_flush_resumes_half_sent_resubscribe() {
	let registry = SubscriptionRegistry::new();
	register_things(&registry, 2);
	// Room for the first pattern and the second one's unsubscribe
	let link = RecordingLink::bounded(3);

	assert_eq!(registry.replay_all(&link), 1);
	assert_eq!(registry.pending_count(), 1);

	link.clear();
	link.set_room(None);
	assert_eq!(registry.flush_pending(&link), 1);
	assert_eq!(link.calls(), vec![LinkCall::Subscribe(
		"things/thing1/event".into()
	)]);
}

#[test]
fn test_flush_without_pending_work_sends_nothing() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::default();
	register_things(&registry, 3);
	registry.replay_all(&link);
	link.clear();

	assert_eq!(registry.flush_pending(&link), 0);
	assert!(link.calls().is_empty());
}

#[test]
fn test_lost_connection_drops_pending_requests() {
	let registry = SubscriptionRegistry::new();
	register_things(&registry, 4);
	registry.replay_all(&RecordingLink::bounded(2));
	assert_eq!(registry.pending_count(), 3);

	registry.clear_broker_state();
	assert_eq!(registry.pending_count(), 0);
	assert_eq!(registry.patterns().len(), 4);
}

#[test]
fn test_unsubscribe_cancels_pending_subscribe() {
	let registry = SubscriptionRegistry::new();
	let link = RecordingLink::bounded(0);
	let (_, handler) = counter();
	registry
		.subscribe("things/thing1/values", handler, Some(&link))
		.unwrap();
	assert_eq!(registry.pending_count(), 1);

	assert!(registry.unsubscribe("things/thing1/values", Some(&link)));

	link.set_room(None);
	assert_eq!(registry.pending_count(), 0);
	assert_eq!(registry.flush_pending(&link), 0);
	assert!(link.calls().is_empty());
}
