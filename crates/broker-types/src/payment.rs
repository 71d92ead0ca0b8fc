//! x402 payment wire structures.
//!
//! These types reproduce the x402 protocol shapes exactly: the 402 challenge
//! body sent to clients, the base64-encoded `X-PAYMENT` header they send
//! back, and the verified-payment record the gate attaches to the request
//! once the facilitator accepts the attestation.
//!
//! The challenge issued to the client and the requirements later handed to
//! the verifier must match field-for-field, so both sides share the one
//! [`PaymentRequirements`] struct.

use alloy_primitives::{Address, U256};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol version carried in every x402 body and header.
pub const X402_VERSION: u32 = 1;

/// Header carrying the base64-encoded payment attestation.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// A priced, addressed obligation attached to a specific resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
	/// Payment scheme. Only "exact" is issued today.
	pub scheme: String,
	/// Network identifier, e.g. "base" or "base-sepolia".
	pub network: String,
	/// Maximum amount required, decimal string in the asset's smallest unit.
	pub max_amount_required: String,
	/// URL of the gated resource.
	pub resource: String,
	pub description: String,
	/// Content type of the gated response.
	pub mime_type: String,
	/// Payee address.
	pub pay_to: Address,
	pub max_timeout_seconds: u64,
	/// Token contract address of the payment asset.
	pub asset: Address,
}

impl PaymentRequirements {
	/// Parses the required amount into an integer of smallest units.
	pub fn amount(&self) -> Result<U256, PaymentHeaderError> {
		U256::from_str_radix(&self.max_amount_required, 10)
			.map_err(|_| PaymentHeaderError::InvalidAmount(self.max_amount_required.clone()))
	}
}

/// Body of an HTTP 402 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
	pub x402_version: u32,
	pub accepts: Vec<PaymentRequirements>,
	/// Discriminated error code, absent on a plain "pay me" challenge.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl PaymentRequired {
	pub fn new(accepts: Vec<PaymentRequirements>) -> Self {
		Self {
			x402_version: X402_VERSION,
			accepts,
			error: None,
		}
	}

	pub fn with_error(accepts: Vec<PaymentRequirements>, error: impl Into<String>) -> Self {
		Self {
			x402_version: X402_VERSION,
			accepts,
			error: Some(error.into()),
		}
	}
}

/// Transfer authorization signed by the payer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPaymentAuthorization {
	pub from: Address,
	pub to: Address,
	/// Amount in smallest units, decimal string.
	pub value: String,
	pub valid_after: String,
	pub valid_before: String,
	/// Unique per attestation; the facilitator enforces single use.
	pub nonce: String,
}

/// Signature plus authorization for the "exact" scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPaymentPayload {
	pub signature: String,
	pub authorization: ExactPaymentAuthorization,
}

/// The decoded `X-PAYMENT` header: the client's proof of payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
	pub x402_version: u32,
	pub scheme: String,
	pub network: String,
	pub payload: ExactPaymentPayload,
}

/// Verification outcome attached to the request context by the gate.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
	/// Payer address recovered by the facilitator.
	pub payer: Address,
	/// The exact requirements the attestation was verified against.
	pub requirements: PaymentRequirements,
}

/// Errors decoding or encoding the payment header.
#[derive(Debug, Error)]
pub enum PaymentHeaderError {
	#[error("header is not valid base64: {0}")]
	InvalidBase64(String),
	#[error("header does not decode to a payment payload: {0}")]
	InvalidJson(String),
	#[error("amount is not a decimal integer: {0}")]
	InvalidAmount(String),
}

/// Decodes a base64 `X-PAYMENT` header value into a payment payload.
pub fn decode_payment_header(value: &str) -> Result<PaymentPayload, PaymentHeaderError> {
	let bytes = BASE64
		.decode(value.trim())
		.map_err(|e| PaymentHeaderError::InvalidBase64(e.to_string()))?;
	serde_json::from_slice(&bytes).map_err(|e| PaymentHeaderError::InvalidJson(e.to_string()))
}

/// Encodes a payment payload into an `X-PAYMENT` header value.
pub fn encode_payment_header(payload: &PaymentPayload) -> String {
	// Serialization of these plain structs cannot fail.
	let json = serde_json::to_vec(payload).expect("payment payload serializes");
	BASE64.encode(json)
}
