use std::fmt::Display;

use tokio::sync::watch;
use tracing::info;

/// Observable state of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connecting,
	Connected,
}

impl Display for ConnectionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			| ConnectionState::Disconnected => "disconnected",
			| ConnectionState::Connecting => "connecting",
			| ConnectionState::Connected => "connected",
		};
		f.write_str(name)
	}
}

/// Publishes state transitions to any number of watchers
#[derive(Debug)]
pub(crate) struct StateTracker {
	tx: watch::Sender<ConnectionState>,
}

impl StateTracker {
	pub fn new() -> Self {
		let (tx, _) = watch::channel(ConnectionState::Disconnected);
		Self { tx }
	}

	pub fn get(&self) -> ConnectionState {
		*self.tx.borrow()
	}

	pub fn is_connected(&self) -> bool {
		self.get() == ConnectionState::Connected
	}

	/// Records a transition; repeated values do not wake watchers
	pub fn set(&self, state: ConnectionState) {
		let changed = self.tx.send_if_modified(|current| {
			if *current == state {
				return false;
			}
			*current = state;
			true
		});
		if changed {
			info!(state = %state, "Connection state changed");
		}
	}

	pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
		self.tx.subscribe()
	}
}
