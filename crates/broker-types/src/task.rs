//! Normalized tasks sent from the orchestrator to the task router.
//!
//! A task pairs a job id with a task type, a provider, an inline or
//! URL-referenced payload, and per-operation metadata. The metadata is a
//! tagged union so each adapter only sees the fields relevant to it and
//! unknown fields are rejected at the boundary.

use serde::{Deserialize, Serialize};

/// The three operation families the broker dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
	Store,
	Run,
	Cache,
}

impl std::fmt::Display for TaskType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TaskType::Store => f.write_str("store"),
			TaskType::Run => f.write_str("run"),
			TaskType::Cache => f.write_str("cache"),
		}
	}
}

/// Metadata for a storage task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreMeta {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub filename: Option<String>,
	#[serde(default)]
	pub permanent: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl_seconds: Option<u64>,
}

/// Metadata for a compute task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunMeta {
	pub language: String,
}

/// Metadata for a cache task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheMeta {
	pub region: String,
	/// Existing cache container id; when absent the adapter creates one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cache_id: Option<String>,
	/// Operation to perform: set, get, delete, list, ttl.
	#[serde(default = "default_cache_operation")]
	pub operation: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub key: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ttl_seconds: Option<u64>,
}

fn default_cache_operation() -> String {
	"set".to_string()
}

/// Per-operation task metadata, discriminated by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskMeta {
	Store(StoreMeta),
	Run(RunMeta),
	Cache(CacheMeta),
}

impl TaskMeta {
	/// The task type this metadata belongs to.
	pub fn task_type(&self) -> TaskType {
		match self {
			TaskMeta::Store(_) => TaskType::Store,
			TaskMeta::Run(_) => TaskType::Run,
			TaskMeta::Cache(_) => TaskType::Cache,
		}
	}
}

/// The unit of work handed to the task router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
	pub job_id: String,
	pub task_type: TaskType,
	pub provider: String,
	/// Inline payload, base64-encoded.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_inline: Option<String>,
	/// Payload by reference.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_url: Option<String>,
	pub meta: TaskMeta,
}

/// Terminal status of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
	Completed,
	/// Reserved for future async providers; no adapter produces it today.
	Running,
	Failed,
}

/// Normalized result returned by the execution layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
	pub job_id: String,
	pub status: ExecutionStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<serde_json::Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
