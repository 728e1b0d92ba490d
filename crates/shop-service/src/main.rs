//! Main entry point for the campus shop service.
//!
//! This binary runs the shop back-office: it serves the order, catalog,
//! settings and reporting API and delivers notifications for order events.
//! Storage backends and push gateways are pluggable and selected by name in
//! the configuration file.

use clap::Parser;
use shop_config::Config;
use shop_core::{ShopBuilder, ShopEngine, ShopFactories};
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod auth;
mod server;

// Import implementations from individual crates
use shop_notify::implementations::log::create_notifier as create_log_notifier;
use shop_notify::implementations::webhook::create_notifier as create_webhook_notifier;
use shop_storage::implementations::file::create_storage as create_file_storage;
use shop_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the shop service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the shop service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the shop engine with all implementations
/// 5. Runs the notification loop and the API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started shop");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.shop.id);

	let shop = Arc::new(build_shop(config.clone())?);
	shop.initialize().await?;

	match config.api.clone().filter(|api| api.enabled) {
		Some(api_config) => {
			let api_shop = Arc::clone(&shop);

			// Run the event loop and the API server concurrently
			tokio::select! {
				result = shop.run() => {
					tracing::info!("Shop engine finished");
					result?;
				}
				result = server::start_server(api_config, api_shop) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running event loop only");
			shop.run().await?;
		},
	}

	shop.shutdown().await?;
	tracing::info!("Stopped shop");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Builds the shop engine with all available implementations.
///
/// This function wires up the concrete implementations for:
/// - Storage backends (in-memory, JSON files)
/// - Push gateways (log, HTTP webhook)
fn build_shop(config: Config) -> Result<ShopEngine, Box<dyn std::error::Error>> {
	let builder = ShopBuilder::new(config);

	let storage_factories = create_factory_map!(
		shop_storage::StorageInterface,
		shop_storage::StorageError,
		"file" => create_file_storage,
		"memory" => create_memory_storage,
	);

	let notifier_factories = create_factory_map!(
		shop_notify::NotifierInterface,
		shop_notify::NotifyError,
		"log" => create_log_notifier,
		"webhook" => create_webhook_notifier,
	);

	let factories = ShopFactories {
		storage_factories,
		notifier_factories,
	};

	Ok(builder.build(factories)?)
}
