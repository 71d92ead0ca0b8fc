//! HTTP server and orchestrator for the x402 broker.
//!
//! The orchestrator composes the payment gate, quote selector, job ledger
//! and the execution layer into one request/response cycle per endpoint.
//! The execution layer is reached over HTTP even when it is this same
//! process: the `/execute` route is the task router's entry point and may
//! be deployed separately without touching the orchestrator.

pub mod execution;
pub mod executor;
pub mod orchestrator;
pub mod server;
pub mod state;

pub use execution::{ExecutionClient, ExecutionError, HttpExecutionClient};
pub use server::{build_router, start_server};
pub use state::AppState;
