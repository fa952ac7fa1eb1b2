//! # Reconnect Watch
//!
//! Keeps one subscription alive across broker restarts and prints every
//! connection state change. Stop the broker while this runs and start it
//! again: the state goes back to connected and property values keep
//! arriving without subscribing again.
//!
//! Runs until Ctrl+C.

mod shared;

use std::time::Duration;

use wost_hub_client::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
	shared::tracing::setup(None);

	let settings = shared::config::broker_settings()
		.with_connect_timeout(Duration::ZERO);
	let thing_id = shared::config::unique_id("thermometer");
	let client = HubClient::for_consumer(settings, "watcher", "");

	client.subscribe_to_property_values(&thing_id, |thing_id, values: PropertyValues| {
		println!("{thing_id}: {values:?}");
	})?;

	let mut states = client.connection().state_changes();
	tokio::spawn(async move {
		while states.changed().await.is_ok() {
			println!("connection state: {}", *states.borrow_and_update());
		}
	});

	// A zero timeout retries until the broker shows up
	println!("Connecting to {}", client.connection().settings().address());
	client.start().await?;

	let mut ticker = tokio::time::interval(Duration::from_secs(2));
	let mut reading = 20.0_f64;
	loop {
		tokio::select! {
			_ = ticker.tick() => {
				reading += 0.1;
				let values = PropertyValues::new().with("temperature", reading);
				if let Err(err) = client.publish_property_values(&thing_id, &values).await {
					println!("publish skipped: {err}");
				}
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	client.stop().await;
	println!("\nGoodbye!");
	Ok(())
}
