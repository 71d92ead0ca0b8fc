//! Payment gate middleware.
//!
//! Decides accept-or-challenge for each inbound request against a
//! statically configured requirement for the route. Requests without an
//! `X-PAYMENT` header are answered with a 402 challenge before any job is
//! created or downstream service is called; requests with one are verified
//! through the facilitator, and the response always waits for the verdict.
//!
//! The requirement embedded in the challenge is the same value later handed
//! to the verifier, so the two match field-for-field by construction.

use crate::facilitator::FacilitatorClient;
use crate::PaymentError;
use axum::{
	extract::State,
	http::{Method, Request, StatusCode},
	middleware::Next,
	response::{IntoResponse, Json, Response},
};
use broker_types::{
	decode_payment_header, PaymentRequired, PaymentRequirements, VerifiedPayment, PAYMENT_HEADER,
};
use serde_json::json;
use std::sync::Arc;

/// Per-route state: the verifier and the expected requirement.
#[derive(Clone)]
pub struct PaymentGateState {
	pub facilitator: Arc<dyn FacilitatorClient>,
	pub requirements: PaymentRequirements,
}

/// Middleware enforcing x402 payment on a route.
pub async fn payment_middleware(
	State(state): State<PaymentGateState>,
	mut request: Request<axum::body::Body>,
	next: Next,
) -> Response {
	// CORS preflight carries no payment.
	if request.method() == Method::OPTIONS {
		return next.run(request).await;
	}

	let header = request
		.headers()
		.get(PAYMENT_HEADER)
		.and_then(|value| value.to_str().ok())
		.map(str::to_owned);

	let Some(header) = header else {
		tracing::debug!(resource = %state.requirements.resource, "payment challenge issued");
		return challenge(PaymentRequired::new(vec![state.requirements.clone()]));
	};

	let payload = match decode_payment_header(&header) {
		Ok(payload) => payload,
		Err(e) => {
			tracing::warn!(error = %e, "rejected malformed payment header");
			return challenge(PaymentRequired::with_error(
				vec![state.requirements.clone()],
				"invalid-payment-header",
			));
		},
	};

	match state
		.facilitator
		.verify(&payload, &state.requirements)
		.await
	{
		Ok(outcome) if outcome.is_valid => {
			let payer = outcome
				.payer
				.unwrap_or(payload.payload.authorization.from);
			tracing::info!(
				payer = %payer,
				resource = %state.requirements.resource,
				"payment verified"
			);
			request.extensions_mut().insert(VerifiedPayment {
				payer,
				requirements: state.requirements.clone(),
			});
			next.run(request).await
		},
		Ok(outcome) => {
			let reason = outcome
				.invalid_reason
				.unwrap_or_else(|| "rejected by facilitator".to_string());
			tracing::warn!(reason = %reason, "payment verification failed");
			challenge(PaymentRequired::with_error(
				vec![state.requirements.clone()],
				format!("payment-verification-failed: {reason}"),
			))
		},
		Err(e @ PaymentError::Network(_)) => {
			tracing::error!(error = %e, "payment verifier unavailable");
			(
				StatusCode::SERVICE_UNAVAILABLE,
				Json(json!({ "error": "payment verifier unavailable" })),
			)
				.into_response()
		},
		Err(e) => {
			tracing::error!(error = %e, "payment verification error");
			(
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(json!({ "error": e.to_string() })),
			)
				.into_response()
		},
	}
}

fn challenge(body: PaymentRequired) -> Response {
	(StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::facilitator::VerifyOutcome;
	use alloy_primitives::Address;
	use async_trait::async_trait;
	use axum::{
		body::Body, extract::Extension, middleware::from_fn_with_state, routing::post, Router,
	};
	use broker_types::{
		encode_payment_header, ExactPaymentAuthorization, ExactPaymentPayload, PaymentPayload,
		X402_VERSION,
	};
	use http_body_util::BodyExt;
	use tower::ServiceExt;

	struct StubFacilitator {
		outcome: Result<VerifyOutcome, ()>,
	}

	#[async_trait]
	impl FacilitatorClient for StubFacilitator {
		async fn verify(
			&self,
			_payload: &PaymentPayload,
			_requirements: &PaymentRequirements,
		) -> Result<VerifyOutcome, PaymentError> {
			match &self.outcome {
				Ok(outcome) => Ok(outcome.clone()),
				Err(()) => Err(PaymentError::Network("facilitator down".into())),
			}
		}
	}

	async fn paid_handler(payment: Extension<VerifiedPayment>) -> Json<serde_json::Value> {
		Json(json!({ "payer": payment.payer.to_string() }))
	}

	fn requirements() -> PaymentRequirements {
		PaymentRequirements {
			scheme: "exact".into(),
			network: "base-sepolia".into(),
			max_amount_required: "10000".into(),
			resource: "https://broker.example/run".into(),
			description: "Run code".into(),
			mime_type: "application/json".into(),
			pay_to: Address::repeat_byte(0x02),
			max_timeout_seconds: 60,
			asset: Address::repeat_byte(0x03),
		}
	}

	fn app(outcome: Result<VerifyOutcome, ()>) -> Router {
		let state = PaymentGateState {
			facilitator: Arc::new(StubFacilitator { outcome }),
			requirements: requirements(),
		};
		Router::new()
			.route("/run", post(paid_handler))
			.layer(from_fn_with_state(state, payment_middleware))
	}

	fn valid_header() -> String {
		encode_payment_header(&PaymentPayload {
			x402_version: X402_VERSION,
			scheme: "exact".into(),
			network: "base-sepolia".into(),
			payload: ExactPaymentPayload {
				signature: "0xsig".into(),
				authorization: ExactPaymentAuthorization {
					from: Address::repeat_byte(0x01),
					to: Address::repeat_byte(0x02),
					value: "10000".into(),
					valid_after: "0".into(),
					valid_before: "9999999999".into(),
					nonce: "0xabc".into(),
				},
			},
		})
	}

	async fn body_json(response: Response) -> serde_json::Value {
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn missing_header_gets_a_plain_challenge() {
		let response = app(Ok(VerifyOutcome {
			is_valid: true,
			invalid_reason: None,
			payer: None,
		}))
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/run")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

		assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
		let body = body_json(response).await;
		assert_eq!(body["x402Version"], 1);
		assert_eq!(body["accepts"][0]["maxAmountRequired"], "10000");
		// A plain challenge carries no error code.
		assert!(body.get("error").is_none());
	}

	#[tokio::test]
	async fn malformed_header_is_a_distinct_402() {
		let response = app(Ok(VerifyOutcome {
			is_valid: true,
			invalid_reason: None,
			payer: None,
		}))
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/run")
				.header(PAYMENT_HEADER, "not base64 at all")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

		assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
		let body = body_json(response).await;
		assert_eq!(body["error"], "invalid-payment-header");
	}

	#[tokio::test]
	async fn rejected_payment_names_the_reason() {
		let response = app(Ok(VerifyOutcome {
			is_valid: false,
			invalid_reason: Some("nonce already used".into()),
			payer: None,
		}))
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/run")
				.header(PAYMENT_HEADER, valid_header())
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

		assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
		let body = body_json(response).await;
		assert_eq!(
			body["error"],
			"payment-verification-failed: nonce already used"
		);
	}

	#[tokio::test]
	async fn verified_payment_reaches_the_handler() {
		let payer = Address::repeat_byte(0x01);
		let response = app(Ok(VerifyOutcome {
			is_valid: true,
			invalid_reason: None,
			payer: Some(payer),
		}))
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/run")
				.header(PAYMENT_HEADER, valid_header())
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();

		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["payer"], payer.to_string());
	}

	#[tokio::test]
	async fn verifier_outage_maps_to_service_unavailable() {
		let response = app(Err(()))
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/run")
					.header(PAYMENT_HEADER, valid_header())
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	}
}
