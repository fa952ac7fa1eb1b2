//! # Thing and Consumer
//!
//! Two hub clients in one process:
//! - a Thing that publishes its description and events, and handles actions
//! - a consumer that watches all descriptions and events and sends an action
//!
//! Topics: `things/<thingID>/td`, `things/<thingID>/event`,
//! `things/<thingID>/action`

mod shared;

use std::time::Duration;

use serde_json::json;
use wost_hub_client::prelude::*;
use wost_hub_client::{ActionRequest, JsonObject};

#[tokio::main]
async fn main() -> Result<()> {
	shared::tracing::setup(None);

	let settings = shared::config::broker_settings();
	println!("Connecting to MQTT broker at {}", settings.address());

	let thing_id = shared::config::unique_id("lamp");
	let thing = HubClient::for_consumer(settings.clone(), thing_id.as_str(), "");
	let consumer = HubClient::for_consumer(settings, "consumer", "");

	// === 1. SUBSCRIPTIONS ===
	// Registered before start; they are sent to the broker on connect
	consumer.subscribe_to_td("", |thing_id, td: ThingDescription| {
		println!(
			"[consumer] discovered {thing_id}: {}",
			td.title().unwrap_or("<untitled>")
		);
	})?;
	consumer.subscribe_to_events("", |thing_id, event: ThingEvent| {
		println!("[consumer] event from {thing_id}: {event:?}");
	})?;

	let events = thing.clone();
	let lamp_id = thing_id.clone();
	thing.subscribe_to_actions(&thing_id, move |_, action: ActionRequest| {
		println!("[thing] action {} with {:?}", action.name, action.input);
		// Handlers run on the event loop; publish from a task
		let events = events.clone();
		let lamp_id = lamp_id.clone();
		tokio::spawn(async move {
			let event = ThingEvent::new().with("switched", action.input.get("on").cloned());
			if let Err(err) = events.publish_event(&lamp_id, &event).await {
				println!("[thing] failed to report action: {err}");
			}
		});
	})?;

	// === 2. CONNECT ===
	thing.start().await?;
	consumer.start().await?;
	println!("Both clients connected");
	tokio::time::sleep(Duration::from_millis(500)).await;

	// === 3. PUBLISH ===
	let td = ThingDescription::new()
		.with("id", thing_id.as_str())
		.with("title", "Desk lamp")
		.with("actions", json!({"switch": {"input": {"type": "object"}}}));
	thing.publish_td(&thing_id, &td).await?;

	let mut input = JsonObject::new();
	input.insert("on".to_string(), json!(true));
	consumer.publish_action(&thing_id, "switch", input).await?;

	tokio::time::sleep(Duration::from_secs(1)).await;

	// === 4. CLEANUP ===
	consumer.stop().await;
	thing.stop().await;
	println!("\nGoodbye!");

	Ok(())
}
