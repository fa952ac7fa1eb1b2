use std::collections::HashSet;

use super::topic_matcher::TopicMatcherNode;
use super::topic_path::TopicPath;
use super::topic_pattern::TopicPattern;

fn pattern(s: &str) -> TopicPattern {
	TopicPattern::new(s).unwrap()
}

// Subscribes every pattern, then checks which ids each topic reaches and
// that the tree agrees with TopicPattern::matches.
fn test_subscriptions(
	subscriptions: &[(&str, usize)],
	expected_matches: &[(&str, Vec<usize>)],
) {
	let mut root = TopicMatcherNode::<Vec<usize>>::new();

	for (pattern_str, sub_id) in subscriptions {
		root.get_or_create(&pattern(pattern_str)).push(*sub_id);
	}

	for (path, expected_sub_ids) in expected_matches {
		let expected: HashSet<usize> = expected_sub_ids.iter().copied().collect();

		let matches = root.find_by_path(&TopicPath::new(*path));
		let actual: HashSet<usize> =
			matches.iter().flat_map(|ids| ids.iter().copied()).collect();

		assert_eq!(
			actual, expected,
			"Path '{}' matched subscriptions {:?}, expected {:?}",
			path, actual, expected
		);

		let by_predicate: HashSet<usize> = subscriptions
			.iter()
			.filter(|(p, _)| pattern(p).matches(path))
			.map(|(_, id)| *id)
			.collect();
		assert_eq!(by_predicate, expected, "predicate mismatch for '{path}'");
	}
}

#[test]
fn test_exact_matches() {
	let subscriptions = [
		("things/thing1/td", 1),
		("things/thing1/event", 2),
		("things/thing2/td", 3),
	];

	let expected_matches = [
		("things/thing1/td", vec![1]),
		("things/thing1/event", vec![2]),
		("things/thing2/td", vec![3]),
		("things/thing2/event", vec![]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_plus_wildcards() {
	let subscriptions = [
		("things/+/td", 1),
		("things/+/+", 2),
		("things/+", 3),
	];

	let expected_matches = [
		("things/thing1/td", vec![1, 2]),
		("things/thing2/td", vec![1, 2]),
		("things/thing1/values", vec![2]),
		("things/thing1", vec![3]),
		("things/thing1/td/extra", vec![]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_hash_wildcards() {
	let subscriptions = [
		("things/thing1/#", 1),
		("things/+/#", 2),
		("#", 3),
	];

	let expected_matches = [
		("things/thing1", vec![1, 2, 3]),
		("things/thing1/action", vec![1, 2, 3]),
		("things/thing2/config", vec![2, 3]),
		("things", vec![3]),
		("other/topic", vec![3]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_system_topics_skip_leading_wildcards() {
	let subscriptions = [("#", 1), ("+/broker/uptime", 2), ("$SYS/#", 3)];

	let expected_matches = [
		("$SYS/broker/uptime", vec![3]),
		("plain/broker/uptime", vec![1, 2]),
	];

	test_subscriptions(&subscriptions, &expected_matches);
}

#[test]
fn test_update_node_prunes_empty_branches() {
	let mut root = TopicMatcherNode::<Vec<usize>>::new();
	let td = pattern("things/+/td");
	let all = pattern("things/thing1/#");
	root.get_or_create(&td).push(1);
	root.get_or_create(&all).push(2);

	let now_empty = root.update_node(td.segments(), |ids| ids.clear()).unwrap();
	assert!(!now_empty);
	assert!(root.find_by_path(&TopicPath::new("things/thing2/td")).is_empty());

	let now_empty = root.update_node(all.segments(), |ids| ids.clear()).unwrap();
	assert!(now_empty);
	assert!(root.is_empty());
}

#[test]
fn test_update_missing_node_is_error() {
	let mut root = TopicMatcherNode::<Vec<usize>>::new();
	root.get_or_create(&pattern("things/thing1/td")).push(1);

	let missing = pattern("things/thing2/td");
	assert!(root.update_node(missing.segments(), |ids| ids.clear()).is_err());
	assert_eq!(
		root.find_by_path(&TopicPath::new("things/thing1/td")).len(),
		1
	);
}
