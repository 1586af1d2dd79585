use std::path::PathBuf;
use std::time::Duration;

use pagewise_core::config_file::WorkerConfig;

/// Per-request RPC timeout used when none is configured.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// How long a freshly spawned worker gets to answer its first health probe.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period callers typically pass to [`close`](crate::ProcessSupervisor::close).
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Everything needed to launch and talk to one worker process.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable. Must exist.
    pub binary_path: PathBuf,
    /// Directory that holds the worker's socket file. Must be a directory.
    pub work_dir: PathBuf,
    /// Suffix for the socket file name. Defaults to a fresh v4 UUID.
    pub instance_id: Option<String>,
    pub request_timeout: Duration,
    pub startup_timeout: Duration,
    /// Passed to the worker after `--uds <path>`.
    pub extra_args: Vec<String>,
    /// Forward worker stdout/stderr into tracing instead of discarding it.
    pub forward_output: bool,
}

impl SupervisorConfig {
    pub fn new(binary_path: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            work_dir: work_dir.into(),
            instance_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            extra_args: Vec::new(),
            forward_output: true,
        }
    }

    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_forward_output(mut self, forward: bool) -> Self {
        self.forward_output = forward;
        self
    }

    /// Overlay timeouts and output settings from a `[worker]` config section.
    ///
    /// Paths are left alone; callers resolve those with their own precedence.
    pub fn apply_file_config(mut self, file: &WorkerConfig) -> Self {
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = file.startup_timeout_secs {
            self.startup_timeout = Duration::from_secs(secs);
        }
        if let Some(forward) = file.forward_output {
            self.forward_output = forward;
        }
        self
    }
}
