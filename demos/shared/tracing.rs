use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up tracing for the demos
///
/// Priority (first match wins):
/// 1. `force_level` when given
/// 2. `RUST_LOG_DISABLE` set: no tracing
/// 3. `RUST_LOG` from the environment or `demos/.env`
/// 4. Otherwise `info`, so reconnects and dropped messages are visible
///
/// ```bash
/// RUST_LOG=wost_hub_client=debug cargo run --example thing_and_consumer
/// ```
pub fn setup(force_level: Option<&str>) {
	load_env_files();

	if std::env::var("RUST_LOG_DISABLE").is_ok() {
		return;
	}

	let filter = match force_level {
		| Some(level) => tracing_subscriber::EnvFilter::new(level),
		| None => tracing_subscriber::EnvFilter::try_from_default_env()
			.unwrap_or_else(|_| "info".into()),
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.with_file(false)
				.with_line_number(false)
				.compact(),
		)
		.init();
}

/// `demos/.env.local` overrides the committed `demos/.env`
pub fn load_env_files() {
	if std::path::Path::new("demos/.env.local").exists() {
		dotenv::from_filename("demos/.env.local").ok();
	}
	dotenv::from_filename("demos/.env").ok();
	dotenv::dotenv().ok();
}
