use std::collections::HashMap;

use arcstr::Substr;
use thiserror::Error;

use super::topic_path::TopicPath;
use super::topic_pattern::{PatternSegment, TopicPattern};

/// Errors that can occur while updating the matcher tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicMatcherError {
	/// No node exists for the segment at the given position
	#[error("No subscription node for segment '{segment}' at position {position}")]
	MissingNode { segment: String, position: usize },
}

impl TopicMatcherError {
	pub fn missing_node(segment: impl Into<String>, position: usize) -> Self {
		Self::MissingNode {
			segment: segment.into(),
			position,
		}
	}
}

/// Anything that can report whether it still holds subscriptions.
pub trait Len {
	fn len(&self) -> usize;
	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> Len for Vec<T> {
	fn len(&self) -> usize {
		Vec::len(self)
	}
}

/// Node in the topic matching tree that represents a part of the topic path.
#[derive(Debug)]
pub struct TopicMatcherNode<T> {
	/// Data for exact topic segment match
	exact_match_data: Option<T>,

	/// Children nodes for exact matches of next segment
	exact_children: HashMap<Substr, TopicMatcherNode<T>>,

	/// Node for '+' pattern wildcard match (single segment)
	single_level_wildcard_node: Option<Box<TopicMatcherNode<T>>>,

	/// Data for '#' pattern wildcard match (multiple segments)
	multi_level_wildcard_data: Option<T>,
}

impl<T: Default + Len> Default for TopicMatcherNode<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default + Len> TopicMatcherNode<T> {
	pub fn new() -> Self {
		Self {
			exact_match_data: None,
			exact_children: HashMap::new(),
			single_level_wildcard_node: None,
			multi_level_wildcard_data: None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.exact_match_data.as_ref().is_none_or(T::is_empty)
			&& self.exact_children.is_empty()
			&& self.single_level_wildcard_node.is_none()
			&& self
				.multi_level_wildcard_data
				.as_ref()
				.is_none_or(T::is_empty)
	}

	/// Finds or creates the data slot for the given pattern
	pub fn get_or_create(&mut self, pattern: &TopicPattern) -> &mut T {
		let mut current_node = self;

		for segment in pattern.segments() {
			match segment {
				| PatternSegment::Literal(s) => {
					current_node = current_node
						.exact_children
						.entry(s.clone())
						.or_default()
				}
				| PatternSegment::SingleLevel => {
					current_node = current_node
						.single_level_wildcard_node
						.get_or_insert_with(|| Box::new(TopicMatcherNode::new()))
				}
				| PatternSegment::MultiLevel => {
					return current_node
						.multi_level_wildcard_data
						.get_or_insert_with(T::default);
				}
			}
		}
		current_node.exact_match_data.get_or_insert_with(T::default)
	}

	/// Returns the data slot of exactly this pattern, if present
	pub fn get(&self, pattern: &TopicPattern) -> Option<&T> {
		let mut current_node = self;
		for segment in pattern.segments() {
			current_node = match segment {
				| PatternSegment::Literal(s) => current_node.exact_children.get(s)?,
				| PatternSegment::SingleLevel => {
					current_node.single_level_wildcard_node.as_deref()?
				}
				| PatternSegment::MultiLevel => {
					return current_node.multi_level_wildcard_data.as_ref();
				}
			};
		}
		current_node.exact_match_data.as_ref()
	}

	/// Applies `f` to the data slot of the given pattern, pruning every node
	/// left empty afterwards. Returns true when this node became empty.
	pub fn update_node<F>(
		&mut self,
		segments: &[PatternSegment],
		f: F,
	) -> Result<bool, TopicMatcherError>
	where
		F: FnOnce(&mut T),
	{
		self.update_node_at(segments, 0, f)
	}

	fn update_node_at<F>(
		&mut self,
		segments: &[PatternSegment],
		position: usize,
		f: F,
	) -> Result<bool, TopicMatcherError>
	where
		F: FnOnce(&mut T),
	{
		let Some((current_segment, rest_segments)) = segments.split_first()
		else {
			let data = self.exact_match_data.as_mut().ok_or_else(|| {
				TopicMatcherError::missing_node("<end>", position)
			})?;
			f(data);
			if data.is_empty() {
				self.exact_match_data = None
			}
			return Ok(self.is_empty());
		};

		match current_segment {
			| PatternSegment::Literal(s) => {
				let child_node =
					self.exact_children.get_mut(s).ok_or_else(|| {
						TopicMatcherError::missing_node(s.as_str(), position)
					})?;
				if child_node.update_node_at(rest_segments, position + 1, f)? {
					self.exact_children.remove(s);
				}
			}
			| PatternSegment::SingleLevel => {
				let child_node = self
					.single_level_wildcard_node
					.as_mut()
					.ok_or_else(|| TopicMatcherError::missing_node("+", position))?;
				if child_node.update_node_at(rest_segments, position + 1, f)? {
					self.single_level_wildcard_node = None;
				}
			}
			| PatternSegment::MultiLevel => {
				let hash_wildcard_data = self
					.multi_level_wildcard_data
					.as_mut()
					.ok_or_else(|| TopicMatcherError::missing_node("#", position))?;
				f(hash_wildcard_data);
				if hash_wildcard_data.is_empty() {
					self.multi_level_wildcard_data = None;
				}
			}
		}
		Ok(self.is_empty())
	}

	/// Recursively collects all subscription data that matches the given topic path segments
	fn collect_matching_subscriptions<'a>(
		&'a self,
		topic: &[Substr],
		matching_data: &mut Vec<&'a T>,
	) {
		match topic {
			| [] => {
				// At end of path, collect data from this node if present
				self.exact_match_data
					.iter()
					.for_each(|data| matching_data.push(data));
				self.multi_level_wildcard_data
					.iter()
					.for_each(|data| matching_data.push(data))
			}
			| [segment, remaining_segments @ ..] => {
				if let Some(child) = self.exact_children.get(segment) {
					child.collect_matching_subscriptions(
						remaining_segments,
						matching_data,
					);
				}
				self.single_level_wildcard_node
					.iter()
					.for_each(|plus_node| {
						plus_node.collect_matching_subscriptions(
							remaining_segments,
							matching_data,
						)
					});
				// # wildcard matches remainder of path
				self.multi_level_wildcard_data
					.iter()
					.for_each(|hash_data| matching_data.push(hash_data));
			}
		}
	}

	/// Finds all subscription data entries matching the given topic path
	pub fn find_by_path<'a>(&'a self, topic: &TopicPath) -> Vec<&'a T> {
		let mut matching_subscribers = Vec::new();
		match topic.segments.split_first() {
			| Some((first, rest)) if topic.is_system() => {
				if let Some(child) = self.exact_children.get(first) {
					child.collect_matching_subscriptions(
						rest,
						&mut matching_subscribers,
					);
				}
			}
			| _ => self.collect_matching_subscriptions(
				&topic.segments,
				&mut matching_subscribers,
			),
		}
		matching_subscribers
	}
}
