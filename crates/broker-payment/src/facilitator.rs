//! Client for the external payment facilitator.
//!
//! The facilitator owns all cryptography: it checks the attestation's
//! signature against the expected requirements and enforces nonce
//! uniqueness (exactly one acceptance per payer/nonce pair). The broker
//! only transports the question and the answer.

use crate::PaymentError;
use alloy_primitives::Address;
use async_trait::async_trait;
use broker_types::{PaymentPayload, PaymentRequirements, X402_VERSION};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Facilitator's verdict on an attestation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
	pub is_valid: bool,
	#[serde(default)]
	pub invalid_reason: Option<String>,
	#[serde(default)]
	pub payer: Option<Address>,
}

/// Trait for attestation verification backends.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait FacilitatorClient: Send + Sync {
	/// Checks `payload` against `requirements`. A transport failure is an
	/// error; a cryptographically rejected payment is `Ok` with
	/// `is_valid == false` and a reason.
	async fn verify(
		&self,
		payload: &PaymentPayload,
		requirements: &PaymentRequirements,
	) -> Result<VerifyOutcome, PaymentError>;
}

/// HTTP facilitator client (`POST {base}/verify`).
pub struct HttpFacilitator {
	client: Client,
	base_url: String,
}

impl HttpFacilitator {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PaymentError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| PaymentError::Network(format!("failed to build HTTP client: {e}")))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl FacilitatorClient for HttpFacilitator {
	async fn verify(
		&self,
		payload: &PaymentPayload,
		requirements: &PaymentRequirements,
	) -> Result<VerifyOutcome, PaymentError> {
		let url = format!("{}/verify", self.base_url);
		let body = json!({
			"x402Version": X402_VERSION,
			"paymentPayload": payload,
			"paymentRequirements": requirements,
		});

		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| PaymentError::Network(format!("facilitator unreachable: {e}")))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(PaymentError::Network(format!(
				"facilitator returned {status}: {body}"
			)));
		}

		response
			.json::<VerifyOutcome>()
			.await
			.map_err(|e| PaymentError::Network(format!("invalid facilitator response: {e}")))
	}
}
