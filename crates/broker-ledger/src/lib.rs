//! Job ledger for the x402 broker.
//!
//! The ledger is the only shared mutable resource in the pipeline: a keyed
//! record store supporting concurrent point writes from independent
//! requests. A job is only ever mutated by the single request that owns it,
//! so no cross-record locking is needed. Records live for the process
//! lifetime only; there is no durability guarantee.
//!
//! The in-memory implementation lives in [`implementations::memory`]; the
//! [`JobStore`] trait keeps the pipeline independent of the backing store.

use async_trait::async_trait;
use broker_types::{Job, JobStatus, Quote};
use thiserror::Error;

pub mod implementations {
	pub mod memory;
}

pub use implementations::memory::MemoryJobStore;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
	/// The requested job id does not exist. Updating a missing job is a
	/// hard error, never a silent no-op.
	#[error("job-not-found: {0}")]
	NotFound(String),
	/// The requested status change would regress the state machine.
	#[error("invalid transition: {from} -> {to}")]
	InvalidTransition { from: JobStatus, to: JobStatus },
	/// A job with this id already exists.
	#[error("job already exists: {0}")]
	AlreadyExists(String),
	/// Failure in the backing store.
	#[error("backend error: {0}")]
	Backend(String),
}

/// Trait defining the interface the pipeline uses to track jobs.
///
/// Transitions are validated against the job state machine: forward moves
/// only, `completed` and `failed` terminal. Every mutation refreshes the
/// job's `updated_at` timestamp and returns the record as stored.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait JobStore: Send + Sync {
	/// Inserts a newly created job.
	async fn insert(&self, job: Job) -> Result<(), LedgerError>;

	/// Retrieves a job by id.
	async fn get(&self, job_id: &str) -> Result<Job, LedgerError>;

	/// Advances a job to `status`.
	async fn transition(&self, job_id: &str, status: JobStatus) -> Result<Job, LedgerError>;

	/// Records the selected provider and quote on a job.
	async fn set_quote(&self, job_id: &str, quote: Quote) -> Result<Job, LedgerError>;

	/// Transitions to `completed` and attaches the result payload.
	async fn complete(&self, job_id: &str, result: serde_json::Value) -> Result<Job, LedgerError>;

	/// Transitions to `failed` and attaches the reason.
	async fn fail(&self, job_id: &str, reason: &str) -> Result<Job, LedgerError>;
}
