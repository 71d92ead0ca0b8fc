//! Orchestrator handlers.
//!
//! Each paid endpoint runs the same pipeline: validate the body, create a
//! job, record the verified payment, price the operation, hand the task to
//! the execution layer and fold the result back into the job. Any failure
//! marks the job `failed` with the reason before the error response goes
//! out, so the ledger and the client always agree.

use axum::{
	extract::{Extension, Path, State},
	Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use broker_ledger::LedgerError;
use broker_pricing::{PricingError, QuoteSpec};
use broker_types::{
	ApiError, ApiJson, CacheMeta, CacheRequest, Job, JobResponse, JobStatus, RunMeta, RunRequest,
	StoreMeta, StoreRequest, Task, TaskMeta, TaskType, VerifiedPayment,
};

use crate::execution::ExecutionError;
use crate::state::AppState;

/// Assumed size for URL-referenced payloads, whose real size is unknown
/// until the provider fetches them.
const DEFAULT_URL_FILE_SIZE: u64 = 1_000_000;

const CACHE_OPERATIONS: &[&str] = &["set", "get", "delete", "list", "ttl"];

pub async fn handle_store(
	State(state): State<AppState>,
	Extension(payment): Extension<VerifiedPayment>,
	ApiJson(request): ApiJson<StoreRequest>,
) -> Result<Json<JobResponse>, ApiError> {
	let file_size = match (&request.data, &request.file_url) {
		(Some(data), _) => {
			let decoded = BASE64
				.decode(data)
				.map_err(|_| ApiError::BadRequest("data must be valid base64".into()))?;
			if decoded.is_empty() {
				return Err(ApiError::BadRequest("data must not be empty".into()));
			}
			decoded.len() as u64
		},
		(None, Some(_)) => DEFAULT_URL_FILE_SIZE,
		(None, None) => {
			return Err(ApiError::BadRequest(
				"either data or fileUrl is required".into(),
			))
		},
	};

	let spec = QuoteSpec::Store {
		file_size,
		permanent: request.permanent,
		ttl: request.ttl,
		filename: request.filename.clone(),
	};
	let meta = TaskMeta::Store(StoreMeta {
		filename: request.filename,
		permanent: request.permanent,
		ttl_seconds: request.ttl,
	});

	run_pipeline(
		&state,
		payment.payer.to_string(),
		spec,
		request.provider.as_deref(),
		TaskType::Store,
		request.data,
		request.file_url,
		meta,
	)
	.await
}

pub async fn handle_run(
	State(state): State<AppState>,
	Extension(payment): Extension<VerifiedPayment>,
	ApiJson(request): ApiJson<RunRequest>,
) -> Result<Json<JobResponse>, ApiError> {
	if request.code.trim().is_empty() {
		return Err(ApiError::BadRequest("code is required".into()));
	}
	if request.language.trim().is_empty() {
		return Err(ApiError::BadRequest("language is required".into()));
	}

	let spec = QuoteSpec::Run {
		code_size: request.code.len() as u64,
		language: request.language.clone(),
	};
	let meta = TaskMeta::Run(RunMeta {
		language: request.language,
	});
	let snippet = BASE64.encode(request.code.as_bytes());

	run_pipeline(
		&state,
		payment.payer.to_string(),
		spec,
		request.provider.as_deref(),
		TaskType::Run,
		Some(snippet),
		None,
		meta,
	)
	.await
}

pub async fn handle_cache(
	State(state): State<AppState>,
	Extension(payment): Extension<VerifiedPayment>,
	ApiJson(request): ApiJson<CacheRequest>,
) -> Result<Json<JobResponse>, ApiError> {
	if request.region.trim().is_empty() {
		return Err(ApiError::BadRequest("region is required".into()));
	}
	let operation = request.operation.unwrap_or_else(|| "set".to_string());
	if !CACHE_OPERATIONS.contains(&operation.as_str()) {
		return Err(ApiError::BadRequest(format!(
			"unknown cache operation '{operation}'"
		)));
	}
	match operation.as_str() {
		"set" => {
			if request.key.is_none() || request.value.is_none() {
				return Err(ApiError::BadRequest(
					"cache set requires key and value".into(),
				));
			}
		},
		"get" | "delete" | "ttl" => {
			if request.key.is_none() {
				return Err(ApiError::BadRequest(format!(
					"cache {operation} requires a key"
				)));
			}
		},
		_ => {},
	}

	let spec = QuoteSpec::Cache {
		region: request.region.clone(),
	};
	let meta = TaskMeta::Cache(CacheMeta {
		region: request.region,
		cache_id: request.cache_id,
		operation,
		key: request.key,
		value: request.value,
		ttl_seconds: request.ttl_seconds,
	});

	run_pipeline(
		&state,
		payment.payer.to_string(),
		spec,
		request.provider.as_deref(),
		TaskType::Cache,
		None,
		None,
		meta,
	)
	.await
}

pub async fn handle_status(
	State(state): State<AppState>,
	Path(job_id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
	let job = state.jobs.get(&job_id).await.map_err(ledger_error)?;
	Ok(Json(job.into()))
}

pub async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
	Json(serde_json::json!({
		"status": "ok",
		"timestamp": chrono::Utc::now(),
		"version": env!("CARGO_PKG_VERSION"),
		"service": state.config.broker.id,
	}))
}

pub async fn handle_providers(State(state): State<AppState>) -> Json<serde_json::Value> {
	let grouped = state.registry.providers();
	let providers: serde_json::Map<String, serde_json::Value> = grouped
		.into_iter()
		.map(|(task_type, names)| (task_type.to_string(), serde_json::json!(names)))
		.collect();
	Json(serde_json::json!({ "providers": providers }))
}

/// The shared pipeline behind the three paid endpoints.
#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
	state: &AppState,
	requester: String,
	spec: QuoteSpec,
	provider: Option<&str>,
	task_type: TaskType,
	file_inline: Option<String>,
	file_url: Option<String>,
	meta: TaskMeta,
) -> Result<Json<JobResponse>, ApiError> {
	let job = Job::new(requester);
	let job_id = job.job_id.clone();
	state.jobs.insert(job).await.map_err(ledger_error)?;

	// The gate already verified the payment before this handler ran.
	if let Err(e) = state
		.jobs
		.transition(&job_id, JobStatus::PaymentRequired)
		.await
	{
		return Err(fail_job(state, &job_id, ledger_error(e)).await);
	}

	let quote_set = match state.quotes.get_quote(&spec, provider).await {
		Ok(set) => set,
		Err(e) => return Err(fail_job(state, &job_id, pricing_error(e)).await),
	};
	let best = quote_set.best;
	let provider_name = best.provider.clone();

	if let Err(e) = state.jobs.set_quote(&job_id, best).await {
		return Err(fail_job(state, &job_id, ledger_error(e)).await);
	}
	if let Err(e) = state
		.jobs
		.transition(&job_id, JobStatus::InstructionsProvided)
		.await
	{
		return Err(fail_job(state, &job_id, ledger_error(e)).await);
	}

	let task = Task {
		job_id: job_id.clone(),
		task_type,
		provider: provider_name,
		file_inline,
		file_url,
		meta,
	};

	if let Err(e) = state.jobs.transition(&job_id, JobStatus::Running).await {
		return Err(fail_job(state, &job_id, ledger_error(e)).await);
	}

	let result = match state.execution.execute(&task).await {
		Ok(result) => result,
		Err(e) => return Err(fail_job(state, &job_id, execution_error(e)).await),
	};

	let final_job = match result.status {
		broker_types::ExecutionStatus::Completed => state
			.jobs
			.complete(&job_id, result.result.unwrap_or(serde_json::Value::Null))
			.await
			.map_err(ledger_error)?,
		broker_types::ExecutionStatus::Failed => {
			let reason = result
				.error
				.as_deref()
				.unwrap_or("provider reported failure");
			state
				.jobs
				.fail(&job_id, reason)
				.await
				.map_err(ledger_error)?
		},
		broker_types::ExecutionStatus::Running => {
			state.jobs.get(&job_id).await.map_err(ledger_error)?
		},
	};

	Ok(Json(final_job.into()))
}

/// Marks the job failed with the error's rendering, then passes the error on.
async fn fail_job(state: &AppState, job_id: &str, error: ApiError) -> ApiError {
	if let Err(e) = state.jobs.fail(job_id, &error.to_string()).await {
		tracing::error!(job_id = %job_id, error = %e, "could not mark job failed");
	}
	error
}

fn ledger_error(error: LedgerError) -> ApiError {
	match error {
		LedgerError::NotFound(_) => ApiError::NotFound(error.to_string()),
		other => ApiError::Internal(other.to_string()),
	}
}

fn pricing_error(error: PricingError) -> ApiError {
	match error {
		PricingError::InvalidSpec(msg) => ApiError::BadRequest(msg),
		PricingError::NoQuotes => ApiError::ServiceUnavailable("no quotes available".into()),
		PricingError::Network(msg) => {
			ApiError::ServiceUnavailable(format!("pricing service unreachable: {msg}"))
		},
		PricingError::InvalidData(msg) => ApiError::Internal(msg),
	}
}

fn execution_error(error: ExecutionError) -> ApiError {
	match error {
		ExecutionError::Network(msg) => {
			ApiError::ServiceUnavailable(format!("execution layer unreachable: {msg}"))
		},
		other => ApiError::Internal(other.to_string()),
	}
}
