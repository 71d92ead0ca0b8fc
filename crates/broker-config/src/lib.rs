//! Configuration for the x402 broker.
//!
//! Loads a single TOML file and validates it at startup, so a bad payee
//! address or a zero price is a boot failure rather than a runtime 500.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("configuration error: {0}")]
	Parse(String),
	#[error("validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		ConfigError::Parse(err.message().to_string())
	}
}

/// Top-level broker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub broker: BrokerConfig,
	pub api: ApiConfig,
	pub payment: PaymentConfig,
	pub pricing: PricingConfig,
	pub execution: ExecutionConfig,
	/// Provider base URLs keyed by provider name.
	#[serde(default)]
	pub providers: HashMap<String, ProviderConfig>,
}

/// Identity of this broker instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrokerConfig {
	pub id: String,
}

/// HTTP API server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
}

/// Inbound payment settings: the chain, payee and per-endpoint prices the
/// broker quotes in its 402 challenges.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
	pub network: String,
	pub pay_to: Address,
	pub asset: Address,
	pub facilitator_url: String,
	#[serde(default = "default_scheme")]
	pub scheme: String,
	#[serde(default = "default_max_timeout_seconds")]
	pub max_timeout_seconds: u64,
	/// Price per endpoint in atomic USDC units (6 decimals).
	pub prices: EndpointPrices,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointPrices {
	pub store: u64,
	pub run: u64,
	pub cache: u64,
}

/// Pricing service client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
	pub url: String,
	#[serde(default = "default_timeout_seconds")]
	pub timeout_seconds: u64,
}

/// Execution layer client settings. The URL may point back at this broker's
/// own `/execute` route.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionConfig {
	pub url: String,
	#[serde(default = "default_execution_timeout_seconds")]
	pub timeout_seconds: u64,
	/// Whether this broker serves `/execute` itself. Disable when a separate
	/// executor handles dispatch, so the route is not publicly reachable.
	#[serde(default = "default_expose_route")]
	pub expose_route: bool,
}

/// Base URL for one backend provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
	pub url: String,
}

fn default_host() -> String {
	"127.0.0.1".to_string()
}

fn default_port() -> u16 {
	3000
}

fn default_scheme() -> String {
	"exact".to_string()
}

fn default_max_timeout_seconds() -> u64 {
	60
}

fn default_timeout_seconds() -> u64 {
	30
}

fn default_execution_timeout_seconds() -> u64 {
	120
}

fn default_expose_route() -> bool {
	true
}

impl Config {
	/// Loads and validates configuration from a TOML file.
	pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let content = tokio::fs::read_to_string(path).await?;
		Self::from_toml(&content)
	}

	/// Parses and validates configuration from a TOML string.
	pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
		let config: Config = toml::from_str(content)?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.broker.id.is_empty() {
			return Err(ConfigError::Validation("broker.id must not be empty".into()));
		}
		if self.api.port == 0 {
			return Err(ConfigError::Validation("api.port must not be zero".into()));
		}
		if self.payment.pay_to == Address::ZERO {
			return Err(ConfigError::Validation(
				"payment.pay_to must not be the zero address".into(),
			));
		}
		if self.payment.asset == Address::ZERO {
			return Err(ConfigError::Validation(
				"payment.asset must not be the zero address".into(),
			));
		}
		for (endpoint, price) in [
			("store", self.payment.prices.store),
			("run", self.payment.prices.run),
			("cache", self.payment.prices.cache),
		] {
			if price == 0 {
				return Err(ConfigError::Validation(format!(
					"payment.prices.{endpoint} must be positive"
				)));
			}
		}
		for (name, url) in [
			("payment.facilitator_url", &self.payment.facilitator_url),
			("pricing.url", &self.pricing.url),
			("execution.url", &self.execution.url),
		] {
			if url.is_empty() {
				return Err(ConfigError::Validation(format!("{name} must not be empty")));
			}
		}
		for (provider, config) in &self.providers {
			if config.url.is_empty() {
				return Err(ConfigError::Validation(format!(
					"providers.{provider}.url must not be empty"
				)));
			}
		}
		Ok(())
	}

	/// Base URL for a named provider, when configured.
	pub fn provider_url(&self, provider: &str) -> Option<&str> {
		self.providers.get(provider).map(|p| p.url.as_str())
	}
}
