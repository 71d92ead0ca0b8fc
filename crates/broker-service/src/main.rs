//! Main entry point for the x402 broker.
//!
//! Loads configuration, wires the pipeline components together and serves
//! the HTTP API until interrupted. The execution layer defaults to this
//! same process: the orchestrator posts tasks to the configured execution
//! URL, which normally points back at the local `/execute` route.

use broker_adapters::{AdapterRegistry, MeritAdapter, OpenX402Adapter, XCacheAdapter};
use broker_config::Config;
use broker_ledger::MemoryJobStore;
use broker_payment::{HttpFacilitator, PaidHttpClient};
use broker_pricing::{HttpQuoteSource, QuoteService};
use broker_service::{server, AppState, HttpExecutionClient};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Command-line arguments for the broker.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to the TOML configuration file
	#[arg(short, long)]
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

	let config = Arc::new(Config::from_file(&args.config).await?);
	tracing::info!("loaded configuration [{}]", config.broker.id);

	let provider_timeout = Duration::from_secs(config.payment.max_timeout_seconds);
	let paid_client = Arc::new(PaidHttpClient::new(provider_timeout)?);

	let mut registry = AdapterRegistry::new();
	if let Some(url) = config.provider_url("openx402") {
		registry.register(Arc::new(OpenX402Adapter::new(paid_client.clone(), url)));
	}
	if let Some(url) = config.provider_url("xcache") {
		registry.register(Arc::new(XCacheAdapter::new(paid_client.clone(), url)));
	}
	if let Some(url) = config.provider_url("merit") {
		registry.register(Arc::new(MeritAdapter::new(paid_client.clone(), url)));
	}
	let registry = Arc::new(registry);
	for (task_type, providers) in registry.providers() {
		tracing::info!(task_type = %task_type, providers = ?providers, "adapters registered");
	}

	let quotes = Arc::new(QuoteService::new(Box::new(HttpQuoteSource::new(
		config.pricing.url.clone(),
		Duration::from_secs(config.pricing.timeout_seconds),
	)?)));
	let facilitator = Arc::new(HttpFacilitator::new(
		config.payment.facilitator_url.clone(),
		Duration::from_secs(config.payment.max_timeout_seconds),
	)?);
	let execution = Arc::new(HttpExecutionClient::new(
		config.execution.url.clone(),
		Duration::from_secs(config.execution.timeout_seconds),
	)?);

	let state = AppState {
		config,
		jobs: Arc::new(MemoryJobStore::new()),
		quotes,
		execution,
		registry,
	};

	server::start_server(state, facilitator).await
}
