//! Task router and provider adapters.
//!
//! The router resolves a task's `(task type, provider)` pair to exactly one
//! registered [`ProviderAdapter`] and dispatches to it. Unknown pairs are a
//! terminal error, never a fallback to some default provider. Adapters own
//! all provider-specific protocol detail and normalize every outcome into
//! `completed` or `failed`; provider-side failures become `failed` with a
//! readable reason rather than bubbling up as transport errors.
//!
//! Adapters call providers through [`broker_payment::PaidHttpClient`], so a
//! provider-side 402 is either paid and retried or reported as a structured
//! payment demand.

pub mod implementations;

pub use implementations::merit::MeritAdapter;
pub use implementations::openx402::OpenX402Adapter;
pub use implementations::xcache::XCacheAdapter;

use async_trait::async_trait;
use broker_payment::PaymentError;
use broker_types::{ExecutionResult, ExecutionStatus, Task, TaskType};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the router itself, before any provider is called.
#[derive(Debug, Error)]
pub enum AdapterError {
	/// No adapter is registered for this task type and provider pair.
	#[error("unsupported provider '{provider}' for task type '{task_type}'")]
	UnsupportedProvider {
		task_type: TaskType,
		provider: String,
	},
	/// The task is missing a field this adapter requires.
	#[error("invalid task: {0}")]
	InvalidTask(String),
}

/// Outcome of one adapter execution.
///
/// Provider-side failures land here as `Failed`, not as `Err`; the error
/// channel is reserved for tasks the adapter could not even attempt.
#[derive(Debug, Clone)]
pub enum AdapterOutcome {
	Completed(serde_json::Value),
	Failed(String),
}

impl AdapterOutcome {
	/// Folds the outcome into the wire-level result for a job.
	pub fn into_result(self, job_id: &str) -> ExecutionResult {
		match self {
			AdapterOutcome::Completed(result) => ExecutionResult {
				job_id: job_id.to_string(),
				status: ExecutionStatus::Completed,
				result: Some(result),
				error: None,
			},
			AdapterOutcome::Failed(reason) => ExecutionResult {
				job_id: job_id.to_string(),
				status: ExecutionStatus::Failed,
				result: None,
				error: Some(reason),
			},
		}
	}
}

/// A provider-specific executor for one task type.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait ProviderAdapter: Send + Sync {
	/// The task type this adapter serves.
	fn task_type(&self) -> TaskType;
	/// Provider name used as the routing key.
	fn name(&self) -> &str;
	/// Executes the task against the provider.
	async fn execute(&self, task: &Task) -> Result<AdapterOutcome, AdapterError>;
}

/// Routing table from `(task type, provider)` to adapter.
#[derive(Default)]
pub struct AdapterRegistry {
	adapters: HashMap<(TaskType, String), Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an adapter under its own `(task_type, name)` key.
	pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
		self.adapters
			.insert((adapter.task_type(), adapter.name().to_string()), adapter);
	}

	/// Names of registered providers, grouped by task type.
	pub fn providers(&self) -> HashMap<TaskType, Vec<String>> {
		let mut grouped: HashMap<TaskType, Vec<String>> = HashMap::new();
		for (task_type, provider) in self.adapters.keys() {
			grouped.entry(*task_type).or_default().push(provider.clone());
		}
		for providers in grouped.values_mut() {
			providers.sort();
		}
		grouped
	}

	/// Dispatches a task to the adapter owning its routing key.
	pub async fn dispatch(&self, task: &Task) -> Result<AdapterOutcome, AdapterError> {
		let key = (task.task_type, task.provider.clone());
		let adapter =
			self.adapters
				.get(&key)
				.ok_or_else(|| AdapterError::UnsupportedProvider {
					task_type: task.task_type,
					provider: task.provider.clone(),
				})?;
		tracing::info!(
			job_id = %task.job_id,
			task_type = %task.task_type,
			provider = %task.provider,
			"dispatching task"
		);
		adapter.execute(task).await
	}
}

/// Folds a provider call error into an adapter outcome.
///
/// Every provider-side failure mode has a readable rendering, so jobs fail
/// with a reason a client can act on.
pub(crate) fn failed_from(error: PaymentError) -> AdapterOutcome {
	AdapterOutcome::Failed(error.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;
	use broker_types::{RunMeta, TaskMeta};
	use serde_json::json;

	struct EchoAdapter;

	#[async_trait]
	impl ProviderAdapter for EchoAdapter {
		fn task_type(&self) -> TaskType {
			TaskType::Run
		}

		fn name(&self) -> &str {
			"echo"
		}

		async fn execute(&self, task: &Task) -> Result<AdapterOutcome, AdapterError> {
			Ok(AdapterOutcome::Completed(json!({ "jobId": task.job_id })))
		}
	}

	fn run_task(provider: &str) -> Task {
		Task {
			job_id: "j1".into(),
			task_type: TaskType::Run,
			provider: provider.into(),
			file_inline: Some("cHJpbnQoMSk=".into()),
			file_url: None,
			meta: TaskMeta::Run(RunMeta {
				language: "python".into(),
			}),
		}
	}

	#[tokio::test]
	async fn dispatch_routes_by_type_and_provider() {
		let mut registry = AdapterRegistry::new();
		registry.register(Arc::new(EchoAdapter));

		let outcome = registry.dispatch(&run_task("echo")).await.unwrap();
		match outcome {
			AdapterOutcome::Completed(result) => assert_eq!(result["jobId"], "j1"),
			other => panic!("expected completion, got {other:?}"),
		}
	}

	#[tokio::test]
	async fn unknown_pair_is_a_terminal_error() {
		let mut registry = AdapterRegistry::new();
		registry.register(Arc::new(EchoAdapter));

		let err = registry.dispatch(&run_task("nonexistent")).await.unwrap_err();
		match err {
			AdapterError::UnsupportedProvider {
				task_type,
				provider,
			} => {
				assert_eq!(task_type, TaskType::Run);
				assert_eq!(provider, "nonexistent");
			},
			other => panic!("expected UnsupportedProvider, got {other:?}"),
		}
	}

	#[test]
	fn outcome_folds_into_execution_result() {
		let completed = AdapterOutcome::Completed(json!({"ok": true})).into_result("j1");
		assert_eq!(completed.status, ExecutionStatus::Completed);
		assert_eq!(completed.result.unwrap()["ok"], true);

		let failed = AdapterOutcome::Failed("provider exploded".into()).into_result("j2");
		assert_eq!(failed.status, ExecutionStatus::Failed);
		assert_eq!(failed.error.as_deref(), Some("provider exploded"));
	}

	#[test]
	fn providers_are_listed_per_task_type() {
		let mut registry = AdapterRegistry::new();
		registry.register(Arc::new(EchoAdapter));
		let providers = registry.providers();
		assert_eq!(providers[&TaskType::Run], vec!["echo".to_string()]);
	}
}
