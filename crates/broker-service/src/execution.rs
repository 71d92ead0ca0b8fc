//! Client for the execution layer.
//!
//! The orchestrator hands tasks to the task router over HTTP. The
//! configured URL may point back at this broker's own `/execute` route or
//! at a separately deployed executor.

use async_trait::async_trait;
use broker_types::{ExecutionResult, Task};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while dispatching a task.
#[derive(Debug, Error)]
pub enum ExecutionError {
	/// Transport failure reaching the execution layer.
	#[error("execution layer unreachable: {0}")]
	Network(String),
	/// The execution layer answered with a non-success status.
	#[error("execution layer returned {status}: {body}")]
	Upstream { status: u16, body: String },
	/// The execution layer's response was not a task result.
	#[error("invalid execution response: {0}")]
	InvalidResponse(String),
}

/// Trait for handing a task to the execution layer.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
	async fn execute(&self, task: &Task) -> Result<ExecutionResult, ExecutionError>;
}

/// HTTP execution client (`POST {base}/execute`).
pub struct HttpExecutionClient {
	client: Client,
	base_url: String,
}

impl HttpExecutionClient {
	pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ExecutionError> {
		let client = Client::builder()
			.timeout(timeout)
			.build()
			.map_err(|e| ExecutionError::Network(format!("failed to build HTTP client: {e}")))?;
		Ok(Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait]
impl ExecutionClient for HttpExecutionClient {
	async fn execute(&self, task: &Task) -> Result<ExecutionResult, ExecutionError> {
		let url = format!("{}/execute", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(task)
			.send()
			.await
			.map_err(|e| ExecutionError::Network(format!("{url}: {e}")))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(ExecutionError::Upstream {
				status: status.as_u16(),
				body,
			});
		}

		response
			.json::<ExecutionResult>()
			.await
			.map_err(|e| ExecutionError::InvalidResponse(e.to_string()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::{ExecutionStatus, RunMeta, TaskMeta, TaskType};
	use serde_json::json;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn task() -> Task {
		Task {
			job_id: "j1".into(),
			task_type: TaskType::Run,
			provider: "merit".into(),
			file_inline: Some("cHJpbnQoMSk=".into()),
			file_url: None,
			meta: TaskMeta::Run(RunMeta {
				language: "python".into(),
			}),
		}
	}

	#[tokio::test]
	async fn task_round_trips_to_the_executor() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/execute"))
			.and(body_partial_json(json!({"jobId": "j1", "taskType": "run"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"jobId": "j1",
				"status": "completed",
				"result": {"stdout": "1\n"}
			})))
			.expect(1)
			.mount(&server)
			.await;

		let client = HttpExecutionClient::new(server.uri(), Duration::from_secs(5)).unwrap();
		let result = client.execute(&task()).await.unwrap();
		assert_eq!(result.status, ExecutionStatus::Completed);
		assert_eq!(result.result.unwrap()["stdout"], "1\n");
	}

	#[tokio::test]
	async fn executor_error_preserves_status_and_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/execute"))
			.respond_with(ResponseTemplate::new(500).set_body_string("router panicked"))
			.mount(&server)
			.await;

		let client = HttpExecutionClient::new(server.uri(), Duration::from_secs(5)).unwrap();
		let err = client.execute(&task()).await.unwrap_err();
		match err {
			ExecutionError::Upstream { status, body } => {
				assert_eq!(status, 500);
				assert_eq!(body, "router panicked");
			},
			other => panic!("expected Upstream, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn garbage_response_is_invalid() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/execute"))
			.respond_with(ResponseTemplate::new(200).set_body_string("not json"))
			.mount(&server)
			.await;

		let client = HttpExecutionClient::new(server.uri(), Duration::from_secs(5)).unwrap();
		let err = client.execute(&task()).await.unwrap_err();
		assert!(matches!(err, ExecutionError::InvalidResponse(_)));
	}
}
