use std::fmt::Display;

/// Identifier assigned to every handler registration.
///
/// Only used to tell handlers apart in logs; registering the same callback
/// twice yields two independent registrations.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct HandlerId(pub(crate) usize);

impl Display for HandlerId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "HandlerId({})", self.0)
	}
}

/// Callback invoked for every message whose topic matches the pattern it
/// was registered under.
///
/// Receives the concrete topic the message arrived on, never the pattern.
/// Runs on the connection's event loop task, so it must not block; use
/// `try_publish` or spawn a task for any follow-up I/O.
pub trait MessageHandler: Send + Sync + 'static {
	fn on_message(&self, topic: &str, payload: &[u8]);
}

impl<F> MessageHandler for F
where F: Fn(&str, &[u8]) + Send + Sync + 'static
{
	fn on_message(&self, topic: &str, payload: &[u8]) {
		self(topic, payload)
	}
}
