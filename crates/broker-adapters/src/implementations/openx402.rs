//! OpenX402 IPFS storage adapter.
//!
//! Pinning is a two-step protocol: upload the raw bytes to RAM for free,
//! then pay to pin the returned file id (`POST /upload` then `GET
//! /pin/{id}`). Unpinned uploads expire after an hour. JSON content skips
//! the upload step and goes straight to the paid `POST /pin/json` endpoint;
//! content counts as JSON when the filename ends in `.json` or the inline
//! payload base64-decodes to a JSON document.

use crate::{failed_from, AdapterError, AdapterOutcome, ProviderAdapter};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use broker_payment::PaidHttpClient;
use broker_types::{Task, TaskMeta, TaskType};
use serde_json::json;
use std::sync::Arc;

pub const OPENX402_PROVIDER: &str = "openx402";

/// Provider-imposed ceiling on a single file.
pub const MAX_FILE_SIZE_BYTES: usize = 100_000_000;

pub struct OpenX402Adapter {
	client: Arc<PaidHttpClient>,
	base_url: String,
}

impl OpenX402Adapter {
	pub fn new(client: Arc<PaidHttpClient>, base_url: impl Into<String>) -> Self {
		Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	async fn pin_json(
		&self,
		content: serde_json::Value,
		filename: Option<&str>,
	) -> AdapterOutcome {
		let mut body = json!({ "content": content });
		if let Some(filename) = filename {
			body["filename"] = json!(filename);
		}
		match self
			.client
			.post_json(&format!("{}/pin/json", self.base_url), body)
			.await
		{
			Ok(response) => AdapterOutcome::Completed(response.body),
			Err(e) => failed_from(e),
		}
	}

	async fn upload_then_pin(&self, upload_body: serde_json::Value) -> AdapterOutcome {
		let uploaded = match self
			.client
			.post_json(&format!("{}/upload", self.base_url), upload_body)
			.await
		{
			Ok(response) => response,
			Err(e) => return failed_from(e),
		};

		let Some(file_id) = uploaded.body["id"]
			.as_str()
			.or_else(|| uploaded.body["fileId"].as_str())
		else {
			return AdapterOutcome::Failed(format!(
				"upload response carried no file id: {}",
				uploaded.body
			));
		};

		match self
			.client
			.get(&format!("{}/pin/{}", self.base_url, file_id))
			.await
		{
			Ok(response) => {
				let mut result = response.body;
				if let Some(map) = result.as_object_mut() {
					map.entry("id").or_insert_with(|| json!(file_id));
				}
				AdapterOutcome::Completed(result)
			},
			Err(e) => failed_from(e),
		}
	}
}

#[async_trait]
impl ProviderAdapter for OpenX402Adapter {
	fn task_type(&self) -> TaskType {
		TaskType::Store
	}

	fn name(&self) -> &str {
		OPENX402_PROVIDER
	}

	async fn execute(&self, task: &Task) -> Result<AdapterOutcome, AdapterError> {
		let TaskMeta::Store(meta) = &task.meta else {
			return Err(AdapterError::InvalidTask(
				"store task requires store metadata".into(),
			));
		};
		let filename = meta.filename.as_deref();
		let json_named = filename.is_some_and(|name| name.ends_with(".json"));

		if let Some(inline) = task.file_inline.as_deref() {
			let decoded = BASE64.decode(inline).map_err(|e| {
				AdapterError::InvalidTask(format!("inline payload is not valid base64: {e}"))
			})?;
			if decoded.len() > MAX_FILE_SIZE_BYTES {
				return Ok(AdapterOutcome::Failed(format!(
					"file too large: {} bytes exceeds the {} byte limit",
					decoded.len(),
					MAX_FILE_SIZE_BYTES
				)));
			}

			let parsed: Option<serde_json::Value> = serde_json::from_slice(&decoded).ok();
			if json_named || parsed.is_some() {
				let content = parsed.unwrap_or_else(|| {
					serde_json::Value::String(String::from_utf8_lossy(&decoded).into_owned())
				});
				tracing::debug!(job_id = %task.job_id, "pinning JSON content");
				return Ok(self.pin_json(content, filename).await);
			}

			let mut body = json!({ "data": inline });
			if let Some(filename) = filename {
				body["filename"] = json!(filename);
			}
			return Ok(self.upload_then_pin(body).await);
		}

		if let Some(url) = task.file_url.as_deref() {
			let mut body = json!({ "url": url });
			if let Some(filename) = filename {
				body["filename"] = json!(filename);
			}
			return Ok(self.upload_then_pin(body).await);
		}

		Err(AdapterError::InvalidTask(
			"store task requires inline content or a file URL".into(),
		))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::StoreMeta;
	use std::time::Duration;
	use wiremock::matchers::{body_partial_json, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn adapter(base_url: &str) -> OpenX402Adapter {
		let client = Arc::new(PaidHttpClient::new(Duration::from_secs(5)).unwrap());
		OpenX402Adapter::new(client, base_url)
	}

	fn store_task(inline: Option<&str>, url: Option<&str>, filename: Option<&str>) -> Task {
		Task {
			job_id: "j1".into(),
			task_type: TaskType::Store,
			provider: OPENX402_PROVIDER.into(),
			file_inline: inline.map(str::to_string),
			file_url: url.map(str::to_string),
			meta: TaskMeta::Store(StoreMeta {
				filename: filename.map(str::to_string),
				permanent: true,
				ttl_seconds: None,
			}),
		}
	}

	#[tokio::test]
	async fn json_content_goes_to_the_json_pin_endpoint() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/pin/json"))
			.and(body_partial_json(json!({"content": {"a": 1}})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"cid": "QmJson"})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("POST"))
			.and(path("/upload"))
			.respond_with(ResponseTemplate::new(200))
			.expect(0)
			.mount(&server)
			.await;

		// base64 of {"a":1}
		let inline = BASE64.encode(br#"{"a":1}"#);
		let outcome = adapter(&server.uri())
			.execute(&store_task(Some(&inline), None, None))
			.await
			.unwrap();
		match outcome {
			AdapterOutcome::Completed(result) => assert_eq!(result["cid"], "QmJson"),
			other => panic!("expected completion, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn json_filename_forces_the_json_endpoint() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/pin/json"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"cid": "QmNamed"})))
			.expect(1)
			.mount(&server)
			.await;

		// Plain text, but the .json name wins.
		let inline = BASE64.encode(b"not json at all");
		let outcome = adapter(&server.uri())
			.execute(&store_task(Some(&inline), None, Some("data.json")))
			.await
			.unwrap();
		assert!(matches!(outcome, AdapterOutcome::Completed(_)));
	}

	#[tokio::test]
	async fn binary_content_uploads_then_pins() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/upload"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f42"})))
			.expect(1)
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/pin/f42"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"cid": "QmBin"})))
			.expect(1)
			.mount(&server)
			.await;

		let inline = BASE64.encode(&[0xde, 0xad, 0xbe, 0xef]);
		let outcome = adapter(&server.uri())
			.execute(&store_task(Some(&inline), None, Some("blob.bin")))
			.await
			.unwrap();
		match outcome {
			AdapterOutcome::Completed(result) => {
				assert_eq!(result["cid"], "QmBin");
				assert_eq!(result["id"], "f42");
			},
			other => panic!("expected completion, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn url_payload_is_uploaded_by_reference() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/upload"))
			.and(body_partial_json(json!({"url": "https://files.example/big.bin"})))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "f7"})))
			.mount(&server)
			.await;
		Mock::given(method("GET"))
			.and(path("/pin/f7"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"cid": "QmUrl"})))
			.mount(&server)
			.await;

		let outcome = adapter(&server.uri())
			.execute(&store_task(None, Some("https://files.example/big.bin"), None))
			.await
			.unwrap();
		assert!(matches!(outcome, AdapterOutcome::Completed(_)));
	}

	#[tokio::test]
	async fn missing_payload_is_an_invalid_task() {
		let err = adapter("http://unused.invalid")
			.execute(&store_task(None, None, None))
			.await
			.unwrap_err();
		assert!(matches!(err, AdapterError::InvalidTask(_)));
	}

	#[tokio::test]
	async fn upload_without_file_id_fails_readably() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/upload"))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
			.mount(&server)
			.await;

		let inline = BASE64.encode(&[0x01, 0x02]);
		let outcome = adapter(&server.uri())
			.execute(&store_task(Some(&inline), None, None))
			.await
			.unwrap();
		match outcome {
			AdapterOutcome::Failed(reason) => assert!(reason.contains("no file id")),
			other => panic!("expected failure, got {other:?}"),
		}
	}
}
