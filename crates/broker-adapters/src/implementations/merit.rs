//! Merit Systems compute adapter.
//!
//! Sends a code snippet for sandboxed execution. The provider takes the
//! snippet base64-encoded together with the language, which is exactly how
//! the task carries its inline payload, so no re-encoding happens here.

use crate::{failed_from, AdapterError, AdapterOutcome, ProviderAdapter};
use async_trait::async_trait;
use broker_payment::PaidHttpClient;
use broker_types::{Task, TaskMeta, TaskType};
use serde_json::json;
use std::sync::Arc;

pub const MERIT_PROVIDER: &str = "merit";

pub struct MeritAdapter {
	client: Arc<PaidHttpClient>,
	base_url: String,
}

impl MeritAdapter {
	pub fn new(client: Arc<PaidHttpClient>, base_url: impl Into<String>) -> Self {
		Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}
}

#[async_trait]
impl ProviderAdapter for MeritAdapter {
	fn task_type(&self) -> TaskType {
		TaskType::Run
	}

	fn name(&self) -> &str {
		MERIT_PROVIDER
	}

	async fn execute(&self, task: &Task) -> Result<AdapterOutcome, AdapterError> {
		let TaskMeta::Run(meta) = &task.meta else {
			return Err(AdapterError::InvalidTask(
				"run task requires run metadata".into(),
			));
		};
		let snippet = task
			.file_inline
			.as_deref()
			.ok_or_else(|| AdapterError::InvalidTask("run task requires inline code".into()))?;

		let body = json!({
			"snippet": snippet,
			"language": meta.language,
		});

		match self.client.post_json(&self.base_url, body).await {
			Ok(response) => {
				tracing::info!(job_id = %task.job_id, language = %meta.language, "code executed");
				Ok(AdapterOutcome::Completed(response.body))
			},
			Err(e) => {
				tracing::warn!(job_id = %task.job_id, error = %e, "code execution failed");
				Ok(failed_from(e))
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::RunMeta;
	use std::time::Duration;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn task(code_b64: &str) -> Task {
		Task {
			job_id: "j1".into(),
			task_type: TaskType::Run,
			provider: MERIT_PROVIDER.into(),
			file_inline: Some(code_b64.into()),
			file_url: None,
			meta: TaskMeta::Run(RunMeta {
				language: "python".into(),
			}),
		}
	}

	fn adapter(base_url: &str) -> MeritAdapter {
		let client = Arc::new(PaidHttpClient::new(Duration::from_secs(5)).unwrap());
		MeritAdapter::new(client, base_url)
	}

	#[tokio::test]
	async fn snippet_and_language_are_forwarded() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/"))
			.and(body_partial_json(json!({
				"snippet": "cHJpbnQoMSk=",
				"language": "python"
			})))
			.respond_with(
				ResponseTemplate::new(200).set_body_json(json!({"stdout": "1\n", "exitCode": 0})),
			)
			.expect(1)
			.mount(&server)
			.await;

		let outcome = adapter(&server.uri())
			.execute(&task("cHJpbnQoMSk="))
			.await
			.unwrap();
		match outcome {
			AdapterOutcome::Completed(result) => assert_eq!(result["stdout"], "1\n"),
			other => panic!("expected completion, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn provider_error_becomes_failed_outcome() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.respond_with(ResponseTemplate::new(500).set_body_string("sandbox crashed"))
			.mount(&server)
			.await;

		let outcome = adapter(&server.uri())
			.execute(&task("cHJpbnQoMSk="))
			.await
			.unwrap();
		match outcome {
			AdapterOutcome::Failed(reason) => assert!(reason.contains("sandbox crashed")),
			other => panic!("expected failure, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn missing_code_is_an_invalid_task() {
		let mut task = task("cHJpbnQoMSk=");
		task.file_inline = None;
		let err = adapter("http://unused.invalid")
			.execute(&task)
			.await
			.unwrap_err();
		assert!(matches!(err, AdapterError::InvalidTask(_)));
	}
}
