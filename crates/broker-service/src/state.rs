//! Shared application state for the broker server.

use broker_adapters::AdapterRegistry;
use broker_config::Config;
use broker_ledger::JobStore;
use broker_pricing::QuoteService;
use std::sync::Arc;

use crate::execution::ExecutionClient;

/// State shared by all routes.
///
/// The ledger is the only mutable member; everything else is configuration
/// or a stateless client.
#[derive(Clone)]
pub struct AppState {
	pub config: Arc<Config>,
	pub jobs: Arc<dyn JobStore>,
	pub quotes: Arc<QuoteService>,
	pub execution: Arc<dyn ExecutionClient>,
	pub registry: Arc<AdapterRegistry>,
}
