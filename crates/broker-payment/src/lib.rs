//! Payment handling for the x402 broker.
//!
//! Three concerns live here:
//!
//! - [`gate`]: axum middleware that turns unpaid requests into 402
//!   challenges and verified ones into request context.
//! - [`facilitator`]: the client for the external verifier that
//!   cryptographically checks attestations (the crypto itself is out of
//!   scope for the broker).
//! - [`proxy`]: the client-side proxy the execution layer uses to call paid
//!   upstream providers, satisfying their 402 challenges when a signer is
//!   configured.

pub mod facilitator;
pub mod gate;
pub mod proxy;

pub use facilitator::{FacilitatorClient, HttpFacilitator, VerifyOutcome};
pub use gate::{payment_middleware, PaymentGateState};
pub use proxy::{PaidHttpClient, PaymentSigner, ProviderResponse};

use alloy_primitives::Address;
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
	/// Transport failure reaching the facilitator or a provider.
	#[error("network error: {0}")]
	Network(String),
	/// A provider demanded payment the proxy could not satisfy. Carries
	/// everything a caller needs to satisfy the challenge itself.
	#[error("payment of {amount} {asset} on {network} to {pay_to} required: {detail}")]
	PaymentDemanded {
		amount: String,
		asset: Address,
		network: String,
		pay_to: Address,
		detail: String,
	},
	/// A provider answered with a non-402 error; status and raw body are
	/// preserved for diagnostics.
	#[error("upstream returned {status}: {body}")]
	Upstream { status: u16, body: String },
	/// The provider's 402 body was not a parseable x402 challenge.
	#[error("malformed payment challenge: {0}")]
	MalformedChallenge(String),
	/// The payment signer could not produce an attestation.
	#[error("payment signing failed: {0}")]
	Signing(String),
}
