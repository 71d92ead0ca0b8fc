//! Request, response and error types for the broker HTTP API.
//!
//! Every error response is valid JSON with a stable `{"error": ...}` shape;
//! 402 responses carry the full x402 challenge body instead.

use crate::job::Job;
use crate::payment::PaymentRequired;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Body of `POST /store`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreRequest {
	/// File content, base64-encoded. Exactly one of `data`/`fileUrl` is required.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_url: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(default)]
	pub permanent: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl: Option<u64>,
	/// Pin a specific provider instead of taking the cheapest quote.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
}

/// Body of `POST /run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
	/// Source code to execute, plain text.
	pub code: String,
	pub language: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
}

/// Body of `POST /cache`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRequest {
	pub region: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub operation: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl_seconds: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
}

/// Response body carrying the current job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
	#[serde(flatten)]
	pub job: Job,
}

impl From<Job> for JobResponse {
	fn from(job: Job) -> Self {
		Self { job }
	}
}

/// JSON body extractor whose rejections follow the API error shape.
///
/// `axum::Json` rejects malformed or incomplete bodies with a plain-text
/// 422; every client input error here must be a 400 with an `{"error"}`
/// JSON body instead.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
	T: DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = ApiError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		match Json::<T>::from_request(req, state).await {
			Ok(Json(value)) => Ok(Self(value)),
			Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
		}
	}
}

/// Errors surfaced by the broker API, one variant per taxonomy class.
#[derive(Debug)]
pub enum ApiError {
	/// Client input error: missing or malformed fields. Never retried.
	BadRequest(String),
	/// Payment missing, malformed or rejected; carries the full 402 body.
	PaymentRequired(PaymentRequired),
	/// Unknown job id.
	NotFound(String),
	/// Upstream unavailability: pricing service down, no providers.
	ServiceUnavailable(String),
	/// Unexpected internal failure; the triggering message is surfaced.
	Internal(String),
}

impl std::fmt::Display for ApiError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ApiError::BadRequest(msg) => write!(f, "bad request: {msg}"),
			ApiError::PaymentRequired(body) => {
				write!(f, "payment required: {}", body.error.as_deref().unwrap_or(""))
			},
			ApiError::NotFound(msg) => write!(f, "not found: {msg}"),
			ApiError::ServiceUnavailable(msg) => write!(f, "service unavailable: {msg}"),
			ApiError::Internal(msg) => write!(f, "internal error: {msg}"),
		}
	}
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			ApiError::BadRequest(msg) => {
				(StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
			},
			ApiError::PaymentRequired(body) => {
				(StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
			},
			ApiError::NotFound(msg) => {
				(StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
			},
			ApiError::ServiceUnavailable(msg) => {
				(StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": msg }))).into_response()
			},
			ApiError::Internal(msg) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				Json(json!({ "error": msg })),
			)
				.into_response(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::payment::PaymentRequired;

	#[test]
	fn error_statuses_follow_the_taxonomy() {
		assert_eq!(
			ApiError::BadRequest("x".into()).into_response().status(),
			StatusCode::BAD_REQUEST
		);
		assert_eq!(
			ApiError::PaymentRequired(PaymentRequired::new(vec![]))
				.into_response()
				.status(),
			StatusCode::PAYMENT_REQUIRED
		);
		assert_eq!(
			ApiError::NotFound("job-not-found".into())
				.into_response()
				.status(),
			StatusCode::NOT_FOUND
		);
		assert_eq!(
			ApiError::ServiceUnavailable("x".into())
				.into_response()
				.status(),
			StatusCode::SERVICE_UNAVAILABLE
		);
		assert_eq!(
			ApiError::Internal("x".into()).into_response().status(),
			StatusCode::INTERNAL_SERVER_ERROR
		);
	}

	#[tokio::test]
	async fn incomplete_body_is_a_400_json_error() {
		use axum::body::Body;
		use axum::http::Request;
		use http_body_util::BodyExt;
		use tower::ServiceExt;

		let app = axum::Router::new().route(
			"/run",
			axum::routing::post(|ApiJson(req): ApiJson<RunRequest>| async move {
				Json(req.language)
			}),
		);
		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/run")
					.header("content-type", "application/json")
					.body(Body::from(r#"{"language":"python"}"#))
					.unwrap(),
			)
			.await
			.unwrap();

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
		assert!(body["error"].as_str().unwrap().contains("code"));
	}

	#[test]
	fn store_request_accepts_camel_case() {
		let body = r#"{"data":"aGVsbG8=","filename":"a.json","permanent":true}"#;
		let req: StoreRequest = serde_json::from_str(body).unwrap();
		assert_eq!(req.filename.as_deref(), Some("a.json"));
		assert!(req.permanent);
		assert!(req.file_url.is_none());
	}
}
