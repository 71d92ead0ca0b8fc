//! Shared types for the x402 broker system.
//!
//! This crate defines the data model that flows through the broker pipeline:
//! tracked jobs, priced quotes, normalized tasks, the x402 payment wire
//! structures, and the API error shape returned by every endpoint.

pub mod api;
pub mod job;
pub mod payment;
pub mod quote;
pub mod task;

pub use api::{ApiError, ApiJson, CacheRequest, JobResponse, RunRequest, StoreRequest};
pub use job::{Job, JobStatus};
pub use payment::{
	decode_payment_header, encode_payment_header, ExactPaymentAuthorization, ExactPaymentPayload,
	PaymentHeaderError, PaymentPayload, PaymentRequired, PaymentRequirements, VerifiedPayment,
	PAYMENT_HEADER, X402_VERSION,
};
pub use quote::{Quote, QuoteSet, USDC_DECIMALS};
pub use task::{
	CacheMeta, ExecutionResult, ExecutionStatus, RunMeta, StoreMeta, Task, TaskMeta, TaskType,
};
