//! Out-of-process extraction worker: spawn, probe, call, shut down.
//!
//! The worker is any executable that accepts `--uds <path>`, serves the
//! extraction RPC on that Unix socket and exits on SIGTERM. [`ProcessSupervisor`]
//! implements [`ExtractionBackend`](pagewise_core::ExtractionBackend), so callers
//! never see the process boundary.
//!
//! Unix only: the transport is a Unix domain socket and shutdown uses signals.

pub mod config;
pub mod health;
pub mod rpc;
pub mod supervisor;

pub use config::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, DEFAULT_STARTUP_TIMEOUT, SupervisorConfig,
};
pub use health::{HEALTH_CHECK_HTML, HEALTH_CHECK_URL, HealthChecker};
pub use rpc::{DOCUMENT_URL_HEADER, RpcClient, interpret_response};
pub use supervisor::{
    HEALTH_FAILURE_GRACE, LifecycleState, ProcessSupervisor, ShutdownOutcome, WORKER_LOG_TARGET,
    WorkerHandle,
};
