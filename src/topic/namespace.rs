//! The hub topic namespace: `things/<thingID>/<messageKind>`.
//!
//! Every message exchanged with the hub is addressed by the ID of the Thing
//! it concerns and the kind of message. These helpers build and parse those
//! topics and must stay bit-exact with existing deployments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First segment of every hub topic
pub const TOPIC_ROOT: &str = "things";

/// Thing ID segment that matches every Thing
pub const ALL_THINGS: &str = "+";

/// Errors when a topic does not belong to the hub namespace
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicParseError {
	/// Topic does not start with the namespace root
	#[error("Topic '{topic}' is not under the 'things' root")]
	ForeignRoot { topic: String },

	/// Topic does not have exactly three segments
	#[error("Topic '{topic}' has {depth} segments, expected 3")]
	WrongDepth { topic: String, depth: usize },

	/// Last segment is not a known message kind
	#[error("Unknown message kind '{kind}'")]
	UnknownKind { kind: String },
}

/// The kind of message carried on a topic
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum MessageKind {
	/// Thing Description document (`td`)
	#[serde(rename = "td")]
	Description,
	/// Property value updates (`values`)
	#[serde(rename = "values")]
	Values,
	/// Thing events (`event`)
	#[serde(rename = "event")]
	Event,
	/// Action requests (`action`)
	#[serde(rename = "action")]
	Action,
	/// Configuration requests (`config`)
	#[serde(rename = "config")]
	Config,
}

impl MessageKind {
	pub const ALL: [MessageKind; 5] = [
		MessageKind::Description,
		MessageKind::Values,
		MessageKind::Event,
		MessageKind::Action,
		MessageKind::Config,
	];

	/// Topic segment for this kind.
	pub const fn as_str(&self) -> &'static str {
		match self {
			| MessageKind::Description => "td",
			| MessageKind::Values => "values",
			| MessageKind::Event => "event",
			| MessageKind::Action => "action",
			| MessageKind::Config => "config",
		}
	}
}

impl fmt::Display for MessageKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for MessageKind {
	type Err = TopicParseError;

	fn from_str(kind: &str) -> Result<Self, Self::Err> {
		MessageKind::ALL
			.into_iter()
			.find(|candidate| candidate.as_str() == kind)
			.ok_or_else(|| TopicParseError::UnknownKind {
				kind: kind.to_string(),
			})
	}
}

/// Maps an empty thing ID to the all-things wildcard.
pub fn thing_selector(thing_id: &str) -> &str {
	if thing_id.is_empty() {
		ALL_THINGS
	} else {
		thing_id
	}
}

/// Topic for a message of `kind` about `thing_id`.
///
/// An empty `thing_id` yields the wildcard topic for all Things.
pub fn thing_topic(thing_id: &str, kind: MessageKind) -> String {
	format!("{TOPIC_ROOT}/{}/{kind}", thing_selector(thing_id))
}

/// Pattern receiving every message kind for `thing_id` (or all Things).
pub fn catch_all_pattern(thing_id: &str) -> String {
	format!("{TOPIC_ROOT}/{}/#", thing_selector(thing_id))
}

/// Splits a received topic into its thing ID and message kind segments.
///
/// Only the segment count is checked, so unknown kinds pass through.
/// Returns `None` for topics with fewer than three segments.
pub fn split_topic(topic: &str) -> Option<(&str, &str)> {
	let mut segments = topic.split('/');
	let _root = segments.next()?;
	let thing_id = segments.next()?;
	let kind = segments.next()?;
	Some((thing_id, kind))
}

/// Strictly parses a hub topic into its thing ID and message kind.
pub fn parse_topic(topic: &str) -> Result<(&str, MessageKind), TopicParseError> {
	let segments: Vec<&str> = topic.split('/').collect();
	match segments.as_slice() {
		| [root, thing_id, kind] if *root == TOPIC_ROOT => {
			Ok((*thing_id, kind.parse()?))
		}
		| [_, _, _] => Err(TopicParseError::ForeignRoot {
			topic: topic.to_string(),
		}),
		| _ => Err(TopicParseError::WrongDepth {
			topic: topic.to_string(),
			depth: segments.len(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_topic_format() {
		assert_eq!(thing_topic("thing1", MessageKind::Description), "things/thing1/td");
		assert_eq!(thing_topic("thing1", MessageKind::Values), "things/thing1/values");
		assert_eq!(thing_topic("thing1", MessageKind::Event), "things/thing1/event");
		assert_eq!(thing_topic("thing1", MessageKind::Action), "things/thing1/action");
		assert_eq!(thing_topic("thing1", MessageKind::Config), "things/thing1/config");
		assert_eq!(thing_topic("", MessageKind::Description), "things/+/td");
		assert_eq!(catch_all_pattern("thing1"), "things/thing1/#");
		assert_eq!(catch_all_pattern(""), "things/+/#");
	}

	#[test]
	fn test_topic_round_trip() {
		let thing_ids = ["thing1", "urn:zone:device-42", "a.b_c"];
		for thing_id in thing_ids {
			for kind in MessageKind::ALL {
				let topic = thing_topic(thing_id, kind);
				assert_eq!(
					parse_topic(&topic),
					Ok((thing_id, kind)),
					"round trip failed for {topic}"
				);
			}
		}
	}

	#[test]
	fn test_split_topic() {
		assert_eq!(split_topic("things/thing1/td"), Some(("thing1", "td")));
		assert_eq!(
			split_topic("things/thing1/custom/extra"),
			Some(("thing1", "custom"))
		);
		assert_eq!(split_topic("things/thing1"), None);
		assert_eq!(split_topic("things"), None);
	}

	#[test]
	fn test_parse_topic_errors() {
		assert_eq!(
			parse_topic("other/thing1/td"),
			Err(TopicParseError::ForeignRoot {
				topic: "other/thing1/td".to_string()
			})
		);
		assert_eq!(
			parse_topic("things/thing1"),
			Err(TopicParseError::WrongDepth {
				topic: "things/thing1".to_string(),
				depth: 2
			})
		);
		assert_eq!(
			parse_topic("things/thing1/provision"),
			Err(TopicParseError::UnknownKind {
				kind: "provision".to_string()
			})
		);
	}

	#[test]
	fn test_kind_serde_names() {
		let json = serde_json::to_string(&MessageKind::Description).unwrap();
		assert_eq!(json, "\"td\"");
		let kind: MessageKind = serde_json::from_str("\"values\"").unwrap();
		assert_eq!(kind, MessageKind::Values);
	}
}
