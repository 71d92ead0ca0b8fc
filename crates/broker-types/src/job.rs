//! Job records tracked by the broker.
//!
//! A job is the broker's own view of one client request's lifecycle,
//! independent of any provider-side identifiers. Status transitions are
//! one-directional; `completed` and `failed` are terminal.

use crate::quote::Quote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle states of a job.
///
/// Not every endpoint family visits every state; flows that resolve
/// synchronously skip `running` and jump straight to a terminal state once
/// the downstream call returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Queued,
	AwaitingPayment,
	PaymentRequired,
	InstructionsProvided,
	Running,
	Completed,
	Failed,
}

impl JobStatus {
	/// Terminal states admit no further transitions.
	pub fn is_terminal(&self) -> bool {
		matches!(self, JobStatus::Completed | JobStatus::Failed)
	}

	/// Ordinal position in the pipeline, used to enforce monotonicity.
	fn rank(&self) -> u8 {
		match self {
			JobStatus::Queued => 0,
			JobStatus::AwaitingPayment => 1,
			JobStatus::PaymentRequired => 2,
			JobStatus::InstructionsProvided => 3,
			JobStatus::Running => 4,
			JobStatus::Completed | JobStatus::Failed => 5,
		}
	}

	/// Whether a transition from `self` to `next` is allowed.
	///
	/// Forward jumps are permitted (a flow may skip intermediate states);
	/// regressions and any move out of a terminal state are not. `failed`
	/// is reachable from every non-terminal state.
	pub fn can_transition_to(&self, next: &JobStatus) -> bool {
		if self.is_terminal() {
			return false;
		}
		if *next == JobStatus::Failed {
			return true;
		}
		next.rank() > self.rank()
	}
}

impl std::fmt::Display for JobStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			JobStatus::Queued => "queued",
			JobStatus::AwaitingPayment => "awaiting_payment",
			JobStatus::PaymentRequired => "payment_required",
			JobStatus::InstructionsProvided => "instructions_provided",
			JobStatus::Running => "running",
			JobStatus::Completed => "completed",
			JobStatus::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// The unit of client-visible work tracked by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
	/// Opaque unique id, generated at creation, immutable.
	pub job_id: String,
	/// Wallet address of the payer, or "anonymous" before verification.
	pub requester: String,
	pub status: JobStatus,
	/// Provider selected by the quote stage, once known.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub provider: Option<String>,
	/// The quote this job was priced against.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub quote: Option<Quote>,
	/// Provider-shaped result payload for completed jobs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<serde_json::Value>,
	/// Failure reason for failed jobs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Job {
	/// Creates a new job in the `queued` state with a fresh id.
	pub fn new(requester: impl Into<String>) -> Self {
		let now = Utc::now();
		Self {
			job_id: Uuid::new_v4().to_string(),
			requester: requester.into(),
			status: JobStatus::Queued,
			provider: None,
			quote: None,
			result: None,
			error: None,
			created_at: now,
			updated_at: now,
		}
	}
}
