//! Task router entry point.
//!
//! `POST /execute` receives a normalized task and dispatches it through the
//! adapter registry. Routing failures (unknown provider, invalid task) are
//! terminal: they come back as a `failed` result for the job, never as a
//! transport-level error, so the orchestrator can record them like any
//! other provider failure.

use axum::{extract::State, Json};
use broker_types::{ApiJson, ExecutionResult, ExecutionStatus, Task};

use crate::state::AppState;

pub async fn handle_execute(
	State(state): State<AppState>,
	ApiJson(task): ApiJson<Task>,
) -> Json<ExecutionResult> {
	let job_id = task.job_id.clone();
	let result = match state.registry.dispatch(&task).await {
		Ok(outcome) => outcome.into_result(&job_id),
		Err(e) => {
			tracing::warn!(job_id = %job_id, error = %e, "task dispatch rejected");
			ExecutionResult {
				job_id,
				status: ExecutionStatus::Failed,
				result: None,
				error: Some(e.to_string()),
			}
		},
	};
	Json(result)
}
