//! Main entry point for the shop order service.
//!
//! Loads the configuration once, wires the configured collaborators into the
//! engine and serves the order API next to the engine's background tasks.

use clap::Parser;
use shop_config::Config;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod factory_registry;
mod server;

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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started shop service");

	let config_path = args
		.config
		.to_str()
		.ok_or("Configuration path is not valid UTF-8")?;
	let config = Config::from_file(config_path).await?;
	tracing::info!("Loaded configuration [{}]", config.shop.id);

	let engine = Arc::new(factory_registry::build_shop_from_config(config.clone())?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			let api_engine = Arc::clone(&engine);

			tokio::select! {
				result = engine.run() => {
					tracing::info!("Engine finished");
					result?;
				}
				result = server::start_server(api_config, api_engine) => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped shop service");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_args_defaults() {
		let args = Args::parse_from(["shop"]);
		assert_eq!(args.config, PathBuf::from("config.toml"));
		assert_eq!(args.log_level, "info");
	}

	#[test]
	fn test_args_custom_values() {
		let args = Args::parse_from(["shop", "--config", "custom.toml", "-l", "debug"]);
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_from_config_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(
			&path,
			r#"
[shop]
id = "file-shop"

[storage]
primary = "memory"
cleanup_interval_seconds = 120
[storage.implementations.memory]

[auth]
sessions = "local"
roles = "local"
[auth.implementations.local]

[api]
enabled = true
port = 3100
"#,
		)
		.unwrap();

		let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
		assert_eq!(config.api.as_ref().map(|api| api.port), Some(3100));

		let engine = factory_registry::build_shop_from_config(config).unwrap();
		assert_eq!(engine.config().shop.id, "file-shop");
	}

	#[test]
	fn test_shipped_config_requires_session_tokens() {
		let shipped = include_str!("../../../config.toml");

		std::env::remove_var("SHOP_ADMIN_TOKEN");
		std::env::remove_var("SHOP_CUSTOMER_TOKEN");
		let err = shipped.parse::<Config>().unwrap_err();
		assert!(err.to_string().contains("SHOP_ADMIN_TOKEN"));

		std::env::set_var("SHOP_ADMIN_TOKEN", "admin-secret");
		std::env::set_var("SHOP_CUSTOMER_TOKEN", "customer-secret");
		let config = shipped.parse::<Config>().unwrap();
		assert_eq!(config.storage.primary, "file");
		std::env::remove_var("SHOP_ADMIN_TOKEN");
		std::env::remove_var("SHOP_CUSTOMER_TOKEN");
	}
}
