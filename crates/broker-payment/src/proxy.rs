//! Outbound payment proxy.
//!
//! Used whenever the execution layer calls a paid upstream provider. The
//! proxy forwards the call; if the provider answers 402 it satisfies the
//! first listed requirement through the configured [`PaymentSigner`] and
//! retries exactly once. Without a signer it fails fast with a structured
//! error naming the amount, asset, network and payee, so the failure is
//! always actionable.

use crate::PaymentError;
use broker_types::{encode_payment_header, PaymentPayload, PaymentRequired, PaymentRequirements, PAYMENT_HEADER};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Response from a provider call, JSON-decoded where possible.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
	pub status: u16,
	pub body: serde_json::Value,
}

/// Produces a signed payment attestation for a requirement.
///
/// This is the seam to the wallet; the cryptography lives behind it.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait PaymentSigner: Send + Sync {
	async fn sign(&self, requirements: &PaymentRequirements)
		-> Result<PaymentPayload, PaymentError>;
}

/// HTTP client that transparently satisfies x402 challenges.
pub struct PaidHttpClient {
	client: Client,
	signer: Option<Arc<dyn PaymentSigner>>,
}

impl PaidHttpClient {
	/// Creates a client without a signer: 402s become structured failures.
	pub fn new(timeout: Duration) -> Result<Self, PaymentError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| PaymentError::Network(format!("failed to build HTTP client: {e}")))?;
		Ok(Self {
			client,
			signer: None,
		})
	}

	/// Attaches a signer enabling automatic pay-then-retry.
	pub fn with_signer(mut self, signer: Arc<dyn PaymentSigner>) -> Self {
		self.signer = Some(signer);
		self
	}

	/// Sends a request, handling at most one 402 challenge along the way.
	pub async fn send(
		&self,
		method: Method,
		url: &str,
		body: Option<serde_json::Value>,
		headers: HeaderMap,
	) -> Result<ProviderResponse, PaymentError> {
		let response = self
			.execute(method.clone(), url, body.as_ref(), headers.clone(), None)
			.await?;

		if response.status() != StatusCode::PAYMENT_REQUIRED {
			return Self::finish(response).await;
		}

		let challenge: PaymentRequired = response
			.json()
			.await
			.map_err(|e| PaymentError::MalformedChallenge(e.to_string()))?;
		let requirement = challenge
			.accepts
			.first()
			.cloned()
			.ok_or_else(|| {
				PaymentError::MalformedChallenge("challenge lists no payment options".into())
			})?;
		// Refuse to pay a challenge whose amount does not parse.
		let amount = requirement
			.amount()
			.map_err(|e| PaymentError::MalformedChallenge(e.to_string()))?;

		let Some(signer) = &self.signer else {
			tracing::warn!(url, %amount, "unpayable provider challenge");
			return Err(demanded(&requirement, "no payment signer configured"));
		};

		tracing::info!(
			url,
			%amount,
			network = %requirement.network,
			"satisfying provider payment challenge"
		);
		let payload = signer.sign(&requirement).await?;
		let header = encode_payment_header(&payload);

		let retry = self
			.execute(method, url, body.as_ref(), headers, Some(&header))
			.await?;
		if retry.status() == StatusCode::PAYMENT_REQUIRED {
			// The provider rejected our payment; do not loop.
			return Err(demanded(&requirement, "challenge repeated after payment"));
		}
		Self::finish(retry).await
	}

	/// `POST` with a JSON body, the common provider call shape.
	pub async fn post_json(
		&self,
		url: &str,
		body: serde_json::Value,
	) -> Result<ProviderResponse, PaymentError> {
		self.send(Method::POST, url, Some(body), HeaderMap::new())
			.await
	}

	/// Plain `GET`.
	pub async fn get(&self, url: &str) -> Result<ProviderResponse, PaymentError> {
		self.send(Method::GET, url, None, HeaderMap::new()).await
	}

	async fn execute(
		&self,
		method: Method,
		url: &str,
		body: Option<&serde_json::Value>,
		headers: HeaderMap,
		payment_header: Option<&str>,
	) -> Result<reqwest::Response, PaymentError> {
		let mut request = self.client.request(method, url).headers(headers);
		if let Some(body) = body {
			request = request.json(body);
		}
		if let Some(value) = payment_header {
			request = request.header(PAYMENT_HEADER, value);
		}
		request
			.send()
			.await
			.map_err(|e| PaymentError::Network(format!("{url}: {e}")))
	}

	async fn finish(response: reqwest::Response) -> Result<ProviderResponse, PaymentError> {
		let status = response.status();
		let text = response
			.text()
			.await
			.map_err(|e| PaymentError::Network(e.to_string()))?;

		if !status.is_success() {
			return Err(PaymentError::Upstream {
				status: status.as_u16(),
				body: text,
			});
		}

		let body = serde_json::from_str(&text)
			.unwrap_or(serde_json::Value::String(text));
		Ok(ProviderResponse {
			status: status.as_u16(),
			body,
		})
	}
}

fn demanded(requirement: &PaymentRequirements, detail: &str) -> PaymentError {
	PaymentError::PaymentDemanded {
		amount: requirement.max_amount_required.clone(),
		asset: requirement.asset,
		network: requirement.network.clone(),
		pay_to: requirement.pay_to,
		detail: detail.to_string(),
	}
}
