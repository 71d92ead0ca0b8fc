//! In-memory job store.
//!
//! Backs the ledger with a `RwLock<HashMap>`: point writes keyed by job id,
//! atomic within the process. Data is lost on restart, which matches the
//! ledger's process-lifetime contract.

use crate::{JobStore, LedgerError};
use async_trait::async_trait;
use broker_types::{Job, JobStatus, Quote};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`JobStore`] implementation.
#[derive(Default)]
pub struct MemoryJobStore {
	jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl MemoryJobStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Applies `mutate` to the stored job under the write lock, refreshing
	/// `updated_at`. Transition checks happen inside `mutate`.
	async fn update_with<F>(&self, job_id: &str, mutate: F) -> Result<Job, LedgerError>
	where
		F: FnOnce(&mut Job) -> Result<(), LedgerError>,
	{
		let mut jobs = self.jobs.write().await;
		let job = jobs
			.get_mut(job_id)
			.ok_or_else(|| LedgerError::NotFound(job_id.to_string()))?;
		mutate(job)?;
		job.updated_at = Utc::now();
		Ok(job.clone())
	}
}

fn check_transition(from: JobStatus, to: JobStatus) -> Result<(), LedgerError> {
	if from.can_transition_to(&to) {
		Ok(())
	} else {
		Err(LedgerError::InvalidTransition { from, to })
	}
}

#[async_trait]
impl JobStore for MemoryJobStore {
	async fn insert(&self, job: Job) -> Result<(), LedgerError> {
		let mut jobs = self.jobs.write().await;
		if jobs.contains_key(&job.job_id) {
			return Err(LedgerError::AlreadyExists(job.job_id));
		}
		tracing::debug!(job_id = %job.job_id, status = %job.status, "job created");
		jobs.insert(job.job_id.clone(), job);
		Ok(())
	}

	async fn get(&self, job_id: &str) -> Result<Job, LedgerError> {
		let jobs = self.jobs.read().await;
		jobs.get(job_id)
			.cloned()
			.ok_or_else(|| LedgerError::NotFound(job_id.to_string()))
	}

	async fn transition(&self, job_id: &str, status: JobStatus) -> Result<Job, LedgerError> {
		self.update_with(job_id, |job| {
			check_transition(job.status, status)?;
			tracing::debug!(job_id, from = %job.status, to = %status, "job transition");
			job.status = status;
			Ok(())
		})
		.await
	}

	async fn set_quote(&self, job_id: &str, quote: Quote) -> Result<Job, LedgerError> {
		self.update_with(job_id, |job| {
			job.provider = Some(quote.provider.clone());
			job.quote = Some(quote);
			Ok(())
		})
		.await
	}

	async fn complete(&self, job_id: &str, result: serde_json::Value) -> Result<Job, LedgerError> {
		self.update_with(job_id, |job| {
			check_transition(job.status, JobStatus::Completed)?;
			job.status = JobStatus::Completed;
			job.result = Some(result);
			Ok(())
		})
		.await
	}

	async fn fail(&self, job_id: &str, reason: &str) -> Result<Job, LedgerError> {
		self.update_with(job_id, |job| {
			check_transition(job.status, JobStatus::Failed)?;
			tracing::warn!(job_id, reason, "job failed");
			job.status = JobStatus::Failed;
			job.error = Some(reason.to_string());
			Ok(())
		})
		.await
	}
}
