//! Router assembly and server startup.
//!
//! Each paid route carries its own payment gate, parameterized with that
//! endpoint's price and resource URL. The same `PaymentRequirements` value
//! is used for the 402 challenge and the later verification, so the two
//! match field-for-field by construction.

use axum::{
	middleware::from_fn_with_state,
	routing::{get, post},
	Router,
};
use broker_config::Config;
use broker_payment::{payment_middleware, FacilitatorClient, PaymentGateState};
use broker_types::PaymentRequirements;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::executor::handle_execute;
use crate::orchestrator::{
	handle_cache, handle_health, handle_providers, handle_run, handle_status, handle_store,
};
use crate::state::AppState;

/// Builds the payment requirement for one paid endpoint.
pub fn endpoint_requirements(config: &Config, endpoint: &str, price: u64) -> PaymentRequirements {
	let description = match endpoint {
		"store" => "Store a file through the broker",
		"run" => "Execute code through the broker",
		"cache" => "Cache operation through the broker",
		_ => "Broker operation",
	};
	PaymentRequirements {
		scheme: config.payment.scheme.clone(),
		network: config.payment.network.clone(),
		max_amount_required: price.to_string(),
		resource: format!(
			"http://{}:{}/{}",
			config.api.host, config.api.port, endpoint
		),
		description: description.to_string(),
		mime_type: "application/json".to_string(),
		pay_to: config.payment.pay_to,
		max_timeout_seconds: config.payment.max_timeout_seconds,
		asset: config.payment.asset,
	}
}

/// Assembles the full broker router.
pub fn build_router(state: AppState, facilitator: Arc<dyn FacilitatorClient>) -> Router {
	let config = state.config.clone();
	let gate = |endpoint: &str, price: u64| PaymentGateState {
		facilitator: facilitator.clone(),
		requirements: endpoint_requirements(&config, endpoint, price),
	};

	let paid_routes = Router::new()
		.route("/store", post(handle_store))
		.layer(from_fn_with_state(
			gate("store", config.payment.prices.store),
			payment_middleware,
		))
		.merge(Router::new().route("/run", post(handle_run)).layer(
			from_fn_with_state(gate("run", config.payment.prices.run), payment_middleware),
		))
		.merge(Router::new().route("/cache", post(handle_cache)).layer(
			from_fn_with_state(gate("cache", config.payment.prices.cache), payment_middleware),
		));

	let mut open_routes = Router::new()
		.route("/status/{job_id}", get(handle_status))
		.route("/health", get(handle_health))
		.route("/providers", get(handle_providers));
	// Only serve dispatch locally when no separate executor is configured.
	if config.execution.expose_route {
		open_routes = open_routes.route("/execute", post(handle_execute));
	}

	Router::new()
		.merge(paid_routes)
		.merge(open_routes)
		.layer(CorsLayer::permissive())
		.with_state(state)
}

/// Binds the configured address and serves until shutdown.
pub async fn start_server(
	state: AppState,
	facilitator: Arc<dyn FacilitatorClient>,
) -> Result<(), Box<dyn std::error::Error>> {
	let bind_address = format!("{}:{}", state.config.api.host, state.config.api.port);
	let app = build_router(state, facilitator);

	let listener = TcpListener::bind(&bind_address).await?;
	tracing::info!("broker API listening on {}", bind_address);
	axum::serve(listener, app).await?;
	Ok(())
}
