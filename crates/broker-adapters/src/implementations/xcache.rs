//! xCache cache adapter.
//!
//! Cache operations need a container. When the task carries no `cacheId`
//! the adapter first creates one in the requested region (`POST /create`,
//! paid), then runs the requested operation against it. The returned result
//! always names the cache id, created or reused, so the client can address
//! the same container on later calls.

use crate::{failed_from, AdapterError, AdapterOutcome, ProviderAdapter};
use async_trait::async_trait;
use broker_payment::PaidHttpClient;
use broker_types::{CacheMeta, Task, TaskMeta, TaskType};
use serde_json::json;
use std::sync::Arc;

pub const XCACHE_PROVIDER: &str = "xcache";

const OPERATIONS: &[&str] = &["set", "get", "delete", "list", "ttl"];

pub struct XCacheAdapter {
	client: Arc<PaidHttpClient>,
	base_url: String,
}

impl XCacheAdapter {
	pub fn new(client: Arc<PaidHttpClient>, base_url: impl Into<String>) -> Self {
		Self {
			client,
			base_url: base_url.into().trim_end_matches('/').to_string(),
		}
	}

	/// Creates a cache container and returns its id.
	async fn create_cache(&self, region: &str) -> Result<String, AdapterOutcome> {
		let response = self
			.client
			.post_json(&format!("{}/create", self.base_url), json!({ "region": region }))
			.await
			.map_err(failed_from)?;

		response.body["cacheId"]
			.as_str()
			.or_else(|| response.body["id"].as_str())
			.map(str::to_string)
			.ok_or_else(|| {
				AdapterOutcome::Failed(format!(
					"cache creation returned no cache id: {}",
					response.body
				))
			})
	}

	fn operation_body(meta: &CacheMeta) -> Result<serde_json::Value, AdapterError> {
		let mut body = serde_json::Map::new();
		match meta.operation.as_str() {
			"set" => {
				let key = meta.key.as_ref().ok_or_else(|| {
					AdapterError::InvalidTask("cache set requires a key".into())
				})?;
				let value = meta.value.as_ref().ok_or_else(|| {
					AdapterError::InvalidTask("cache set requires a value".into())
				})?;
				body.insert("key".into(), json!(key));
				body.insert("value".into(), value.clone());
				if let Some(ttl) = meta.ttl_seconds {
					body.insert("ttlSeconds".into(), json!(ttl));
				}
			},
			"get" | "delete" | "ttl" => {
				let key = meta.key.as_ref().ok_or_else(|| {
					AdapterError::InvalidTask(format!(
						"cache {} requires a key",
						meta.operation
					))
				})?;
				body.insert("key".into(), json!(key));
			},
			"list" => {},
			other => {
				return Err(AdapterError::InvalidTask(format!(
					"unknown cache operation '{other}'"
				)))
			},
		}
		Ok(serde_json::Value::Object(body))
	}
}

#[async_trait]
impl ProviderAdapter for XCacheAdapter {
	fn task_type(&self) -> TaskType {
		TaskType::Cache
	}

	fn name(&self) -> &str {
		XCACHE_PROVIDER
	}

	async fn execute(&self, task: &Task) -> Result<AdapterOutcome, AdapterError> {
		let TaskMeta::Cache(meta) = &task.meta else {
			return Err(AdapterError::InvalidTask(
				"cache task requires cache metadata".into(),
			));
		};
		if !OPERATIONS.contains(&meta.operation.as_str()) {
			return Err(AdapterError::InvalidTask(format!(
				"unknown cache operation '{}'",
				meta.operation
			)));
		}
		let body = Self::operation_body(meta)?;

		let (cache_id, created) = match &meta.cache_id {
			Some(id) => (id.clone(), false),
			None => {
				tracing::info!(job_id = %task.job_id, region = %meta.region, "creating cache container");
				match self.create_cache(&meta.region).await {
					Ok(id) => (id, true),
					Err(outcome) => return Ok(outcome),
				}
			},
		};

		let url = format!("{}/cache/{}/{}", self.base_url, cache_id, meta.operation);
		match self.client.post_json(&url, body).await {
			Ok(response) => Ok(AdapterOutcome::Completed(json!({
				"cacheId": cache_id,
				"created": created,
				"operation": meta.operation,
				"result": response.body,
			}))),
			Err(e) => {
				tracing::warn!(job_id = %task.job_id, cache_id = %cache_id, error = %e, "cache operation failed");
				Ok(failed_from(e))
			},
		}
	}
}
