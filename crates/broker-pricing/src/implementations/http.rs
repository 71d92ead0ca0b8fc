//! HTTP quote source backed by the external pricing service.
//!
//! Talks to the quote engine's `/quote/store`, `/quote/run` and
//! `/quote/cache` endpoints. The storage endpoint answers with a quote set
//! (`{quotes, best, count}`); run and cache answer with a single quote
//! object.
//!
//! The pricing service prices in decimal USD (`price_usd`); this module is
//! the one place that converts to the broker's canonical representation,
//! atomic USDC units (six decimals). Fractional atomic units are truncated.

use crate::{PricingError, QuoteSource, QuoteSpec};
use async_trait::async_trait;
use broker_types::{PaymentRequirements, Quote, USDC_DECIMALS};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Quote source that queries the pricing service over HTTP.
pub struct HttpQuoteSource {
	client: Client,
	base_url: String,
}

/// Quote object as the pricing service emits it.
#[derive(Debug, Deserialize)]
struct WireQuote {
	provider: String,
	price_usd: Option<f64>,
	#[serde(default)]
	estimated_duration_seconds: Option<u64>,
	#[serde(default)]
	x402_instructions: Option<serde_json::Value>,
	#[serde(flatten)]
	extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of the storage quote endpoint.
#[derive(Debug, Deserialize)]
struct WireQuoteSet {
	quotes: Vec<WireQuote>,
}

impl HttpQuoteSource {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PricingError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| PricingError::Network(format!("failed to build HTTP client: {e}")))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}

	fn endpoint_and_body(&self, spec: &QuoteSpec) -> (String, serde_json::Value) {
		match spec {
			QuoteSpec::Store {
				file_size,
				permanent,
				ttl,
				filename,
			} => (
				format!("{}/quote/store", self.base_url),
				json!({
					"fileSize": file_size,
					"permanent": permanent,
					"ttl": ttl,
					"fileName": filename,
				}),
			),
			QuoteSpec::Run {
				code_size,
				language,
			} => (
				format!("{}/quote/run", self.base_url),
				json!({ "codeSize": code_size, "language": language }),
			),
			QuoteSpec::Cache { region } => (
				format!("{}/quote/cache", self.base_url),
				json!({ "region": region }),
			),
		}
	}
}

#[async_trait]
impl QuoteSource for HttpQuoteSource {
	async fn fetch(&self, spec: &QuoteSpec) -> Result<Vec<Quote>, PricingError> {
		let (url, body) = self.endpoint_and_body(spec);

		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| PricingError::Network(format!("{url}: {e}")))?;

		let status = response.status();
		if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
			// The pricing service signals "no eligible providers" with 503.
			return Ok(Vec::new());
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(PricingError::Network(format!(
				"pricing service returned {status}: {body}"
			)));
		}

		let payload: serde_json::Value = response
			.json()
			.await
			.map_err(|e| PricingError::InvalidData(e.to_string()))?;

		// Storage answers with a quote set, run and cache with one quote.
		let wire_quotes = if payload.get("quotes").is_some() {
			let set: WireQuoteSet = serde_json::from_value(payload)
				.map_err(|e| PricingError::InvalidData(e.to_string()))?;
			set.quotes
		} else {
			let single: WireQuote = serde_json::from_value(payload)
				.map_err(|e| PricingError::InvalidData(e.to_string()))?;
			vec![single]
		};

		wire_quotes.into_iter().map(into_quote).collect()
	}
}

fn into_quote(wire: WireQuote) -> Result<Quote, PricingError> {
	let price = match wire.price_usd {
		Some(usd) => usd_to_atomic(usd)?,
		None => 0,
	};

	// A provider x402 requirement rides along when complete; otherwise the
	// raw instructions stay visible in metadata.
	let mut metadata = wire.extra;
	let payment = match wire.x402_instructions {
		Some(instructions) => match serde_json::from_value::<PaymentRequirements>(
			instructions.clone(),
		) {
			Ok(parsed) => Some(parsed),
			Err(_) => {
				metadata.insert("x402Instructions".to_string(), instructions);
				None
			},
		},
		None => None,
	};

	Ok(Quote {
		provider: wire.provider,
		price,
		estimated_duration_seconds: wire.estimated_duration_seconds,
		available: wire.price_usd.is_some(),
		payment,
		metadata: serde_json::Value::Object(metadata),
	})
}

/// Converts decimal USD to atomic USDC units (truncating).
fn usd_to_atomic(usd: f64) -> Result<u64, PricingError> {
	let decimal = Decimal::try_from(usd)
		.map_err(|e| PricingError::InvalidData(format!("bad price_usd {usd}: {e}")))?;
	if decimal.is_sign_negative() {
		return Err(PricingError::InvalidData(format!("negative price_usd {usd}")));
	}
	let scale = Decimal::from(10u64.pow(USDC_DECIMALS));
	(decimal * scale)
		.trunc()
		.to_u64()
		.ok_or_else(|| PricingError::InvalidData(format!("price_usd {usd} out of range")))
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn source(uri: &str) -> HttpQuoteSource {
		HttpQuoteSource::new(uri, Duration::from_secs(5)).unwrap()
	}

	#[test]
	fn usd_conversion_is_six_decimals_truncating() {
		assert_eq!(usd_to_atomic(0.01).unwrap(), 10_000);
		assert_eq!(usd_to_atomic(1.5).unwrap(), 1_500_000);
		assert_eq!(usd_to_atomic(0.0000001).unwrap(), 0);
		assert!(usd_to_atomic(-0.01).is_err());
	}

	#[tokio::test]
	async fn store_endpoint_parses_quote_set() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/quote/store"))
			.and(body_partial_json(serde_json::json!({"fileSize": 1000})))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"quotes": [
					{"provider": "openx402", "price_usd": 0.01, "platform": "ipfs"},
					{"provider": "galaksio_storage", "price_usd": 0.02}
				],
				"best": {"provider": "openx402", "price_usd": 0.01},
				"count": 2
			})))
			.expect(1)
			.mount(&server)
			.await;

		let spec = QuoteSpec::Store {
			file_size: 1000,
			permanent: false,
			ttl: None,
			filename: None,
		};
		let quotes = source(&server.uri()).fetch(&spec).await.unwrap();
		assert_eq!(quotes.len(), 2);
		assert_eq!(quotes[0].provider, "openx402");
		assert_eq!(quotes[0].price, 10_000);
		assert_eq!(quotes[0].metadata["platform"], "ipfs");
		assert_eq!(quotes[1].price, 20_000);
	}

	#[tokio::test]
	async fn run_endpoint_parses_single_quote() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/quote/run"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"provider": "merit",
				"price_usd": 0.05,
				"language": "python",
				"x402_instructions": {"scheme": "exact", "network": "base"}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let spec = QuoteSpec::Run {
			code_size: 42,
			language: "python".into(),
		};
		let quotes = source(&server.uri()).fetch(&spec).await.unwrap();
		assert_eq!(quotes.len(), 1);
		assert_eq!(quotes[0].price, 50_000);
		// Partial instructions are kept as metadata, not parsed requirements.
		assert!(quotes[0].payment.is_none());
		assert_eq!(quotes[0].metadata["x402Instructions"]["scheme"], "exact");
	}

	#[tokio::test]
	async fn service_unavailable_means_no_quotes() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/quote/cache"))
			.respond_with(ResponseTemplate::new(503).set_body_json(
				serde_json::json!({"detail": "no providers"}),
			))
			.mount(&server)
			.await;

		let spec = QuoteSpec::Cache {
			region: "us-east-1".into(),
		};
		let quotes = source(&server.uri()).fetch(&spec).await.unwrap();
		assert!(quotes.is_empty());
	}

	#[tokio::test]
	async fn server_error_is_a_transport_failure() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/quote/run"))
			.respond_with(ResponseTemplate::new(500).set_body_string("boom"))
			.mount(&server)
			.await;

		let spec = QuoteSpec::Run {
			code_size: 42,
			language: "python".into(),
		};
		let err = source(&server.uri()).fetch(&spec).await.unwrap_err();
		assert!(matches!(err, PricingError::Network(_)));
	}
}
