//! Subscription patterns with MQTT wildcard segments

use arcstr::{ArcStr, Substr};
use thiserror::Error;

/// Error types for topic pattern parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPatternError {
	/// Empty pattern is not valid
	#[error("Topic pattern cannot be empty")]
	EmptyPattern,
}

/// MQTT topic pattern segment: literal string or wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
	/// Literal string segment
	Literal(Substr),
	/// Single-level wildcard `+`
	SingleLevel,
	/// Multi-level wildcard `#`, only ever the last segment
	MultiLevel,
}

impl PatternSegment {
	/// Returns string representation of the segment.
	pub fn as_str(&self) -> &str {
		match self {
			| PatternSegment::Literal(s) => s,
			| PatternSegment::SingleLevel => "+",
			| PatternSegment::MultiLevel => "#",
		}
	}

	/// Returns true if this segment is a wildcard (+ or #).
	pub fn is_wildcard(&self) -> bool {
		!matches!(self, PatternSegment::Literal(_))
	}
}

impl std::fmt::Display for PatternSegment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// A parsed subscription pattern.
///
/// Keeps the exact pattern string it was created from; the registry keys
/// subscriptions by that string. Only emptiness is rejected: a segment that
/// is exactly `+` is a single-level wildcard, a trailing `#` is a
/// multi-level wildcard, and everything else is matched literally. The
/// broker remains the authority on whether a pattern is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
	pattern: ArcStr,
	segments: Vec<PatternSegment>,
}

impl TopicPattern {
	/// Parses a pattern string such as `things/+/td` or `things/thing1/#`.
	pub fn new(pattern: impl Into<ArcStr>) -> Result<Self, TopicPatternError> {
		let pattern = pattern.into();
		if pattern.is_empty() {
			return Err(TopicPatternError::EmptyPattern);
		}
		let last = pattern.split('/').count() - 1;
		let segments = pattern
			.split('/')
			.enumerate()
			.map(|(position, segment)| match segment {
				| "+" => PatternSegment::SingleLevel,
				| "#" if position == last => PatternSegment::MultiLevel,
				| _ => PatternSegment::Literal(pattern.substr_from(segment)),
			})
			.collect();
		Ok(Self { pattern, segments })
	}

	/// The exact pattern string this was parsed from.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Shared handle to the pattern string.
	pub fn pattern(&self) -> &ArcStr {
		&self.pattern
	}

	pub fn segments(&self) -> &[PatternSegment] {
		&self.segments
	}

	/// True if any segment is a wildcard.
	pub fn is_wildcard(&self) -> bool {
		self.segments.iter().any(PatternSegment::is_wildcard)
	}

	/// Checks a concrete topic against this pattern using MQTT wildcard
	/// rules. Topics starting with `$` are never matched by a leading
	/// wildcard.
	pub fn matches(&self, topic: &str) -> bool {
		if topic.starts_with('$')
			&& self.segments.first().is_some_and(PatternSegment::is_wildcard)
		{
			return false;
		}
		let topic_segments: Vec<&str> = topic.split('/').collect();
		match_segments(&self.segments, &topic_segments)
	}
}

fn match_segments(pattern: &[PatternSegment], topic: &[&str]) -> bool {
	match (pattern, topic) {
		| ([PatternSegment::MultiLevel], _) => true,
		| ([], []) => true,
		| ([], _) | (_, []) => false,
		| ([PatternSegment::SingleLevel, rest_pattern @ ..], [_, rest @ ..]) => {
			match_segments(rest_pattern, rest)
		}
		| (
			[PatternSegment::Literal(expected), rest_pattern @ ..],
			[segment, rest @ ..],
		) => expected.as_str() == *segment && match_segments(rest_pattern, rest),
		| ([PatternSegment::MultiLevel, ..], _) => false,
	}
}

impl std::fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.pattern)
	}
}

impl TryFrom<&str> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(pattern: &str) -> Result<Self, Self::Error> {
		Self::new(pattern)
	}
}

impl TryFrom<String> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(pattern: String) -> Result<Self, Self::Error> {
		Self::new(pattern)
	}
}
