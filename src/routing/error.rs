use thiserror::Error;

use crate::topic::TopicPatternError;

/// Errors during subscription operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
	/// Pattern could not be parsed
	#[error("Invalid subscription pattern: {0}")]
	InvalidPattern(#[from] TopicPatternError),
}
