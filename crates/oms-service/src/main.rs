//! Main entry point for the marketplace order service.
//!
//! Loads configuration, wires the engine with its storage backend and
//! external collaborators, and serves the HTTP API until interrupted.

use clap::Parser;
use oms_config::Config;
use oms_core::{Engine, EngineBuilder};
use oms_settlement::PaymentGateway;
use oms_types::Notifier;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod auth;
mod collaborators;
mod server;

use auth::StaticTokenAuth;
use collaborators::{HttpPaymentGateway, LogNotifier, ManualPaymentGateway, WebhookNotifier};
use oms_storage::implementations::file::create_storage as create_file_storage;
use oms_storage::implementations::memory::create_storage as create_memory_storage;

/// Command-line arguments for the marketplace service.
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
	let env_filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone()));
	fmt().with_env_filter(env_filter).with_target(true).init();

	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", config.marketplace.id);

	let engine = Arc::new(build_engine(config.clone())?);

	let api_enabled = config.api.as_ref().is_some_and(|api| api.enabled);
	if api_enabled {
		// Presence checked just above.
		let api_config = config.api.clone().ok_or("api section missing")?;
		let auth = Arc::new(StaticTokenAuth::from_config(&api_config));
		let server = server::start_server(api_config, Arc::clone(&engine), auth);
		tokio::select! {
			result = server => {
				tracing::info!("API server finished");
				result?;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("Shutdown signal received");
			}
		}
	} else {
		tracing::warn!("API server disabled; nothing to serve");
		tokio::signal::ctrl_c().await?;
	}

	tracing::info!("Stopped marketplace service");
	Ok(())
}

/// Builds the engine with the storage backends and collaborators this
/// binary ships.
fn build_engine(config: Config) -> Result<Engine, Box<dyn std::error::Error>> {
	let http_client = reqwest::Client::builder()
		.timeout(std::time::Duration::from_secs(30))
		.build()?;

	let notifier: Arc<dyn Notifier> = match config
		.api
		.as_ref()
		.and_then(|api| api.notify_webhook_url.clone())
	{
		Some(url) => {
			tracing::info!(url = %url, "Notifications will be posted to webhook");
			Arc::new(WebhookNotifier::new(http_client.clone(), url))
		}
		None => Arc::new(LogNotifier),
	};

	let gateway: Arc<dyn PaymentGateway> = match &config.payments {
		Some(payments) => {
			tracing::info!(endpoint = %payments.endpoint, "Using HTTP payment processor");
			Arc::new(HttpPaymentGateway::new(http_client, payments))
		}
		None => {
			tracing::warn!("No payment processor configured; refunds will be flagged for manual processing");
			Arc::new(ManualPaymentGateway)
		}
	};

	let engine = EngineBuilder::new(config)
		.with_storage_factory("file", create_file_storage)
		.with_storage_factory("memory", create_memory_storage)
		.with_notifier(notifier)
		.with_payment_gateway(gateway)
		.build()?;
	Ok(engine)
}
