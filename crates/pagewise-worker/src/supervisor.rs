//! Lifecycle of one out-of-process extraction worker.
//!
//! ```text
//! NotStarted -> Starting -> Ready -> Closing -> Closed
//!                   \_________________/
//!                  (health check failed)
//! ```
//!
//! The supervisor owns the child process, its socket file and the single RPC
//! connection. `close` is idempotent and always removes the socket file.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use pagewise_core::{
    BackendFuture, ExtractError, Extraction, ExtractionBackend, ExtractionRequest, TransportError,
};

use crate::config::SupervisorConfig;
use crate::health::HealthChecker;
use crate::rpc::RpcClient;

/// Tracing target for lines the worker writes to stdout/stderr.
pub const WORKER_LOG_TARGET: &str = "pagewise::worker";

/// Grace period for the close that follows a failed health check.
pub const HEALTH_FAILURE_GRACE: Duration = Duration::from_secs(3);

/// Bound on waiting for the reaper after the process is known to be gone or killed.
const EXIT_WAIT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotStarted,
    Starting,
    Ready,
    Closing,
    Closed,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::NotStarted,
            1 => LifecycleState::Starting,
            2 => LifecycleState::Ready,
            3 => LifecycleState::Closing,
            _ => LifecycleState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::NotStarted => 0,
            LifecycleState::Starting => 1,
            LifecycleState::Ready => 2,
            LifecycleState::Closing => 3,
            LifecycleState::Closed => 4,
        }
    }
}

/// How a successful [`ProcessSupervisor::close`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// An earlier call already shut the worker down.
    AlreadyClosed,
    /// The worker had exited on its own before close was called.
    AlreadyExited,
    /// The worker exited within the grace period after SIGTERM.
    Graceful,
    /// The grace period expired and the worker was killed.
    Killed,
}

/// Lock-free lifecycle state shared by `parse` and `close`.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    fn get(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: LifecycleState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }

    /// Move to `Closing` unless shutdown already began. Returns false if it had.
    fn begin_close(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match LifecycleState::from_u8(current) {
                    LifecycleState::Closing | LifecycleState::Closed => None,
                    _ => Some(LifecycleState::Closing.as_u8()),
                }
            })
            .is_ok()
    }
}

/// The worker process owned by one supervisor.
#[derive(Debug)]
pub struct WorkerHandle {
    pid: Option<u32>,
    socket_path: PathBuf,
    state: StateCell,
    child: Mutex<Option<Child>>,
}

impl WorkerHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    fn take_child(&self) -> Option<Child> {
        self.child.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    fn remove_socket(&self) {
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => {
                tracing::debug!(socket = %self.socket_path.display(), "removed worker socket");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "failed to remove worker socket"
                );
            }
        }
    }
}

/// Owns a worker process and serializes extraction calls to it.
pub struct ProcessSupervisor {
    instance_id: String,
    handle: WorkerHandle,
    rpc: tokio::sync::Mutex<RpcClient>,
    request_timeout: Duration,
}

impl ProcessSupervisor {
    /// Spawn the worker and wait until it answers a health probe.
    ///
    /// On health-check failure the worker is shut down (with a
    /// [`HEALTH_FAILURE_GRACE`] grace period) before the error is returned,
    /// so no process or socket file is left behind.
    pub async fn start(
        config: SupervisorConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, ExtractError> {
        validate_paths(&config)?;

        let instance_id = config
            .instance_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let socket_path = config
            .work_dir
            .join(format!("pagewise-worker-{instance_id}.sock"));
        remove_stale_socket(&socket_path)?;

        let (stdout, stderr) = if config.forward_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };
        let mut child = Command::new(&config.binary_path)
            .arg("--uds")
            .arg(&socket_path)
            .args(&config.extra_args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExtractError::Startup(format!(
                    "failed to spawn worker {}: {e}",
                    config.binary_path.display()
                ))
            })?;
        let pid = child.id();

        if config.forward_output {
            if let Some(out) = child.stdout.take() {
                forward_lines(out, pid, "stdout");
            }
            if let Some(err) = child.stderr.take() {
                forward_lines(err, pid, "stderr");
            }
        } else {
            tracing::warn!(pid, "worker output forwarding disabled; worker logs are suppressed");
        }

        tracing::info!(
            pid,
            instance = %instance_id,
            socket = %socket_path.display(),
            "spawned extraction worker"
        );

        let supervisor = Self {
            instance_id,
            handle: WorkerHandle {
                pid,
                socket_path: socket_path.clone(),
                state: StateCell::new(LifecycleState::Starting),
                child: Mutex::new(Some(child)),
            },
            rpc: tokio::sync::Mutex::new(RpcClient::new(socket_path)),
            request_timeout: config.request_timeout,
        };

        let probe = HealthChecker::probe_request();
        let health = HealthChecker::default()
            .wait_until_healthy(config.startup_timeout, cancel, |timeout| {
                supervisor.call(&probe, timeout, cancel)
            })
            .await;

        match health {
            Ok(attempts) => {
                supervisor.handle.state.set(LifecycleState::Ready);
                tracing::info!(pid, attempts, "extraction worker ready");
                Ok(supervisor)
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "worker failed health check; shutting it down");
                if let Err(close_err) = supervisor.close(HEALTH_FAILURE_GRACE).await {
                    tracing::error!(pid, error = %close_err, "cleanup after failed health check");
                }
                Err(e)
            }
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn handle(&self) -> &WorkerHandle {
        &self.handle
    }

    pub fn pid(&self) -> Option<u32> {
        self.handle.pid()
    }

    pub fn socket_path(&self) -> &Path {
        self.handle.socket_path()
    }

    pub fn state(&self) -> LifecycleState {
        self.handle.state()
    }

    /// Extract one document. Fails with `Closed` once shutdown has begun.
    pub async fn parse(
        &self,
        request: &ExtractionRequest,
        cancel: &CancellationToken,
    ) -> Result<Extraction, ExtractError> {
        match self.state() {
            LifecycleState::Ready => {}
            LifecycleState::Closing | LifecycleState::Closed => return Err(ExtractError::Closed),
            state => {
                return Err(ExtractError::Startup(format!(
                    "worker is not ready (state {state:?})"
                )));
            }
        }

        let mut rpc = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled.into()),
            guard = self.rpc.lock() => guard,
        };
        // close() may have started while we queued for the lock
        if matches!(self.state(), LifecycleState::Closing | LifecycleState::Closed) {
            return Err(ExtractError::Closed);
        }

        let started = Instant::now();
        let result = rpc
            .post_document(request, self.request_timeout, cancel)
            .await;
        tracing::debug!(
            url = %request.document_url,
            bytes = request.html_body.len(),
            elapsed = ?started.elapsed(),
            ok = result.is_ok(),
            "worker extraction finished"
        );
        result
    }

    /// RPC without the lifecycle check; used by the startup health probe.
    async fn call(
        &self,
        request: &ExtractionRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Extraction, ExtractError> {
        self.rpc
            .lock()
            .await
            .post_document(request, timeout, cancel)
            .await
    }

    /// Stop the worker: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// Idempotent. The socket file is removed and the state becomes `Closed`
    /// whatever the outcome. `ShutdownTimeout` means the process could not be
    /// confirmed dead even after SIGKILL.
    pub async fn close(&self, grace: Duration) -> Result<ShutdownOutcome, ExtractError> {
        if !self.handle.state.begin_close() {
            return Ok(ShutdownOutcome::AlreadyClosed);
        }

        let started = Instant::now();
        let outcome = self.terminate(grace).await;
        self.handle.remove_socket();
        self.handle.state.set(LifecycleState::Closed);

        match &outcome {
            Ok(how) => tracing::info!(
                pid = self.pid(),
                outcome = ?how,
                elapsed = ?started.elapsed(),
                "extraction worker stopped"
            ),
            Err(e) => tracing::error!(pid = self.pid(), error = %e, "extraction worker shutdown"),
        }
        outcome
    }

    async fn terminate(&self, grace: Duration) -> Result<ShutdownOutcome, ExtractError> {
        let Some(mut child) = self.handle.take_child() else {
            return Ok(ShutdownOutcome::AlreadyClosed);
        };

        let exited_early = matches!(child.try_wait(), Ok(Some(_)));
        if !exited_early && let Some(pid) = child.id() {
            if let Err(e) = send_sigterm(pid) {
                // Usually ESRCH: it died between try_wait and kill.
                tracing::debug!(pid, error = %e, "SIGTERM not delivered");
            }
        }
        let (kill_tx, mut exited) = spawn_reaper(child);

        if exited_early {
            return match tokio::time::timeout(EXIT_WAIT, &mut exited).await {
                Ok(_) => Ok(ShutdownOutcome::AlreadyExited),
                Err(_) => Err(ExtractError::ShutdownTimeout(
                    "reaping an already-exited worker did not finish".into(),
                )),
            };
        }

        if tokio::time::timeout(grace, &mut exited).await.is_ok() {
            return Ok(ShutdownOutcome::Graceful);
        }

        tracing::warn!(pid = self.pid(), ?grace, "worker ignored SIGTERM; killing it");
        let _ = kill_tx.send(());
        match tokio::time::timeout(EXIT_WAIT, &mut exited).await {
            Ok(_) => Ok(ShutdownOutcome::Killed),
            Err(_) => Err(ExtractError::ShutdownTimeout(format!(
                "worker {} still running {EXIT_WAIT:?} after SIGKILL",
                self.pid().map_or_else(|| "?".to_string(), |p| p.to_string())
            ))),
        }
    }
}

impl ExtractionBackend for ProcessSupervisor {
    fn name(&self) -> &str {
        "worker"
    }

    fn parse<'a>(
        &'a self,
        request: &'a ExtractionRequest,
        cancel: &'a CancellationToken,
    ) -> BackendFuture<'a> {
        Box::pin(ProcessSupervisor::parse(self, request, cancel))
    }
}

impl Drop for ProcessSupervisor {
    fn drop(&mut self) {
        if self.state() != LifecycleState::Closed {
            // An unreaped child dies via kill_on_drop. Once close() has handed it
            // to the reaper, dropping the abandoned close future drops the kill
            // sender and the reaper sends SIGKILL itself.
            tracing::warn!(pid = self.pid(), "supervisor dropped without close");
            self.handle.remove_socket();
        }
    }
}

fn validate_paths(config: &SupervisorConfig) -> Result<(), ExtractError> {
    let work_dir = &config.work_dir;
    let meta = std::fs::metadata(work_dir).map_err(|e| {
        ExtractError::Startup(format!(
            "work directory {} is not accessible: {e}",
            work_dir.display()
        ))
    })?;
    if !meta.is_dir() {
        return Err(ExtractError::Startup(format!(
            "work directory {} is not a directory",
            work_dir.display()
        )));
    }
    if !config.binary_path.exists() {
        return Err(ExtractError::Startup(format!(
            "worker binary {} does not exist",
            config.binary_path.display()
        )));
    }
    Ok(())
}

fn remove_stale_socket(path: &Path) -> Result<(), ExtractError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::debug!(socket = %path.display(), "removed stale worker socket");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ExtractError::Startup(format!(
            "cannot remove stale socket {}: {e}",
            path.display()
        ))),
    }
}

/// Forward each line of a worker stream into tracing.
fn forward_lines<R>(stream: R, pid: Option<u32>, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    tracing::info!(target: WORKER_LOG_TARGET, pid, stream = name, "{line}");
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(pid, stream = name, error = %e, "worker output closed");
                    break;
                }
            }
        }
    });
}

/// Detached task that owns the child until it is reaped.
///
/// Sending on the returned `Sender`, or dropping it, escalates to SIGKILL.
/// The task runs to completion even if both channel ends are dropped.
fn spawn_reaper(mut child: Child) -> (oneshot::Sender<()>, oneshot::Receiver<Option<ExitStatus>>) {
    let (kill_tx, kill_rx) = oneshot::channel::<()>();
    let (exit_tx, exit_rx) = oneshot::channel();

    tokio::spawn(async move {
        // A dropped sender means the closer gave up waiting; escalate then too.
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = kill_rx => None,
        };
        let status = match waited {
            Some(status) => status,
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "SIGKILL not delivered");
                }
                child.wait().await
            }
        };
        match &status {
            Ok(status) => tracing::debug!(%status, "worker reaped"),
            Err(e) => tracing::warn!(error = %e, "waiting on worker failed"),
        }
        let _ = exit_tx.send(status.ok());
    });

    (kill_tx, exit_rx)
}

fn send_sigterm(pid: u32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
