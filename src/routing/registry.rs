use std::{
	collections::{BTreeMap, HashMap, HashSet},
	panic::{AssertUnwindSafe, catch_unwind},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use arcstr::ArcStr;
use tracing::{debug, error, info, warn};

use super::broker_link::BrokerLink;
use super::error::SubscriptionError;
use super::handler::{HandlerId, MessageHandler};
use crate::topic::{TopicMatcherNode, TopicPath, TopicPattern};

#[derive(Clone)]
struct RegisteredHandler {
	id: HandlerId,
	pattern: ArcStr,
	handler: Arc<dyn MessageHandler>,
}

/// Broker request still owed to the current session for a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingOp {
	/// Unsubscribe first, then subscribe
	Resubscribe,
	Subscribe,
}

#[derive(Default)]
struct RegistryState {
	matcher: TopicMatcherNode<Vec<RegisteredHandler>>,
	patterns: HashMap<ArcStr, TopicPattern>,
	/// Patterns the current broker session is known to carry
	on_broker: HashSet<ArcStr>,
	/// Requests the link refused, typically because the request queue was
	/// full. Retried in pattern order by `flush_pending`.
	pending: BTreeMap<ArcStr, PendingOp>,
	next_id: usize,
}

impl RegistryState {
	/// Sends pending requests until the link refuses one. Returns how many
	/// patterns reached the broker.
	fn flush(&mut self, link: &dyn BrokerLink) -> usize {
		let mut flushed = 0;
		while let Some(mut entry) = self.pending.first_entry() {
			if *entry.get() == PendingOp::Resubscribe {
				if let Err(err) = link.unsubscribe(entry.key()) {
					debug!(topic_pattern = %entry.key(), error = ?err, "Broker queue full, unsubscribe deferred");
					break;
				}
				*entry.get_mut() = PendingOp::Subscribe;
			}
			if let Err(err) = link.subscribe(entry.key()) {
				debug!(topic_pattern = %entry.key(), error = ?err, "Broker queue full, subscribe deferred");
				break;
			}
			let (pattern, _) = entry.remove_entry();
			self.on_broker.insert(pattern);
			flushed += 1;
		}
		flushed
	}
}

/// Logical subscriptions, keyed by the exact pattern string.
///
/// Registrations outlive any single broker session. After every successful
/// (re)connect [`SubscriptionRegistry::replay_all`] pushes them back onto the
/// broker, so a reconnect never silently drops a subscription.
///
/// Handlers are never called with the internal lock held. A handler may
/// subscribe, unsubscribe, or publish from inside its callback.
#[derive(Default)]
pub struct SubscriptionRegistry {
	state: Mutex<RegistryState>,
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	fn state(&self) -> MutexGuard<'_, RegistryState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Adds `handler` under `pattern`.
	///
	/// The broker subscription is issued through `link` only when the
	/// pattern is not yet active on the broker. Pass `None` while
	/// disconnected; the next replay takes care of it. A request the link
	/// refuses stays pending until [`SubscriptionRegistry::flush_pending`]
	/// gets it through.
	pub fn subscribe(
		&self,
		pattern: &str,
		handler: Arc<dyn MessageHandler>,
		link: Option<&dyn BrokerLink>,
	) -> Result<HandlerId, SubscriptionError> {
		let pattern = TopicPattern::new(pattern)?;
		let key = pattern.pattern().clone();

		let mut state = self.state();
		let id = HandlerId(state.next_id);
		state.next_id += 1;

		state.matcher.get_or_create(&pattern).push(RegisteredHandler {
			id,
			pattern: key.clone(),
			handler,
		});
		state.patterns.entry(key.clone()).or_insert(pattern);

		if let Some(link) = link {
			if !state.on_broker.contains(&key) {
				state
					.pending
					.entry(key.clone())
					.or_insert(PendingOp::Subscribe);
				state.flush(link);
				if state.pending.contains_key(&key) {
					warn!(
						topic_pattern = %key,
						pending = state.pending.len(),
						"Broker subscribe queued until the request channel drains"
					);
				}
			}
		}
		debug!(topic_pattern = %key, handler_id = %id, "Handler registered");
		Ok(id)
	}

	/// Removes every handler registered under `pattern`.
	///
	/// Returns false when the pattern was not registered, which is logged
	/// and otherwise ignored.
	pub fn unsubscribe(
		&self,
		pattern: &str,
		link: Option<&dyn BrokerLink>,
	) -> bool {
		let mut state = self.state();
		let Some(topic_pattern) = state.patterns.remove(pattern) else {
			warn!(topic_pattern = %pattern, "Unsubscribe of unknown pattern ignored");
			return false;
		};

		if let Err(err) = state
			.matcher
			.update_node(topic_pattern.segments(), |handlers| handlers.clear())
		{
			error!(
				topic_pattern = %pattern,
				error = ?err,
				"Subscription tree out of sync with pattern table"
			);
		}

		state.pending.remove(pattern);
		let was_on_broker = state.on_broker.remove(pattern);
		if let (true, Some(link)) = (was_on_broker, link) {
			if let Err(err) = link.unsubscribe(pattern) {
				warn!(
					topic_pattern = %pattern,
					error = ?err,
					"Broker unsubscribe failed"
				);
			}
		}
		debug!(topic_pattern = %pattern, "All handlers removed");
		true
	}

	/// Re-issues every registered pattern on the broker in pattern order,
	/// unsubscribing first so a stale broker-side entry never masks a
	/// missing one.
	///
	/// Whatever does not fit into the link's request queue stays pending
	/// and goes out through [`SubscriptionRegistry::flush_pending`]. Returns
	/// how many patterns were sent right away.
	pub fn replay_all(&self, link: &dyn BrokerLink) -> usize {
		let mut state = self.state();
		let state = &mut *state;
		state.on_broker.clear();
		state.pending = state
			.patterns
			.keys()
			.map(|pattern| (pattern.clone(), PendingOp::Resubscribe))
			.collect();

		let replayed = state.flush(link);
		info!(
			replayed,
			deferred = state.pending.len(),
			registered = state.patterns.len(),
			"Subscriptions replayed"
		);
		replayed
	}

	/// Retries broker requests that did not fit into the link's queue.
	/// Called by the event loop after every poll, which is what drains
	/// that queue. Returns how many patterns reached the broker.
	pub fn flush_pending(&self, link: &dyn BrokerLink) -> usize {
		let mut state = self.state();
		if state.pending.is_empty() {
			return 0;
		}
		let flushed = state.flush(link);
		if flushed > 0 {
			debug!(flushed, remaining = state.pending.len(), "Pending subscriptions sent");
		}
		flushed
	}

	/// Forgets what the broker holds, and what was still owed to it, while
	/// keeping every logical subscription.
	pub fn clear_broker_state(&self) {
		let mut state = self.state();
		state.on_broker.clear();
		state.pending.clear();
	}

	/// Delivers a message to every handler whose pattern matches `topic`.
	///
	/// Handlers run in registration order. The list is snapshotted under the
	/// lock and invoked after it is released. A panicking handler is logged and does not stop delivery
	/// to the rest. Returns the number of handlers invoked.
	pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
		let path = TopicPath::new(topic);
		let mut handlers: Vec<RegisteredHandler> = {
			let state = self.state();
			state
				.matcher
				.find_by_path(&path)
				.into_iter()
				.flatten()
				.cloned()
				.collect()
		};
		// Registration order across all matching patterns
		handlers.sort_by_key(|registered| registered.id);

		if handlers.is_empty() {
			debug!(topic = %topic, "No handler for incoming message");
			return 0;
		}

		for registered in &handlers {
			let delivery = catch_unwind(AssertUnwindSafe(|| {
				registered.handler.on_message(topic, payload)
			}));
			if delivery.is_err() {
				error!(
					handler_id = %registered.id,
					topic_pattern = %registered.pattern,
					topic = %topic,
					"Message handler panicked"
				);
			}
		}
		handlers.len()
	}

	/// Registered patterns in lexical order
	pub fn patterns(&self) -> Vec<String> {
		let mut patterns: Vec<String> =
			self.state().patterns.keys().map(ToString::to_string).collect();
		patterns.sort();
		patterns
	}

	pub fn is_subscribed(&self, pattern: &str) -> bool {
		self.state().patterns.contains_key(pattern)
	}

	pub fn is_on_broker(&self, pattern: &str) -> bool {
		self.state().on_broker.contains(pattern)
	}

	/// Patterns waiting for room in the broker request queue
	pub fn pending_count(&self) -> usize {
		self.state().pending.len()
	}

	pub fn handler_count(&self, pattern: &str) -> usize {
		let state = self.state();
		state
			.patterns
			.get(pattern)
			.and_then(|p| state.matcher.get(p))
			.map_or(0, Vec::len)
	}
}
