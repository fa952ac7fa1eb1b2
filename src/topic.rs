//! Topic handling module
//!
//! Covers the `things/<id>/<kind>` namespace used by the hub, MQTT
//! subscription patterns with `+` and `#` wildcards, and the matcher tree
//! that resolves an incoming topic to every pattern it satisfies.

pub mod namespace;
pub mod topic_matcher;
pub mod topic_path;
pub mod topic_pattern;

#[cfg(test)]
mod topic_matcher_tests;

pub use namespace::{
	ALL_THINGS, MessageKind, TOPIC_ROOT, TopicParseError, catch_all_pattern,
	parse_topic, split_topic, thing_selector, thing_topic,
};
pub use topic_matcher::{Len, TopicMatcherError, TopicMatcherNode};
pub use topic_path::TopicPath;
pub use topic_pattern::{PatternSegment, TopicPattern, TopicPatternError};
