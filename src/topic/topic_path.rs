use std::fmt;

use arcstr::{ArcStr, Substr};

/// A concrete topic as received from the broker, split into segments.
#[derive(Debug, Clone)]
pub struct TopicPath {
	pub path: ArcStr,
	pub segments: Vec<Substr>,
}

impl TopicPath {
	pub fn new(path: impl Into<ArcStr>) -> Self {
		let path = path.into();
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}

	pub fn as_str(&self) -> &str {
		&self.path
	}

	/// System topics (`$SYS/...`) are excluded from leading wildcards.
	pub fn is_system(&self) -> bool {
		self.path.starts_with('$')
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}
