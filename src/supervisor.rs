//! Lifecycle of the external rendering server.
//!
//! At most one child runs at a time. Restarts are serialized through a
//! single async mutex: the previous child is killed and reaped, the port is
//! given a moment to be released, and only then is the next child spawned.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Tracing target for lines the rendering server prints.
pub const OUTPUT_TARGET: &str = "easy_slide::renderer";

/// Default rendering server executable.
pub const DEFAULT_PROGRAM: &str = "reveal-md";

/// Port the rendering server binds to.
pub const DEFAULT_RENDERER_PORT: u16 = 1948;

/// Pause between killing the old child and spawning the new one.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stop renderer (pid {pid:?}): {source}")]
    Kill {
        pid: Option<u32>,
        #[source]
        source: std::io::Error,
    },
}

/// How to launch the rendering server.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub program: String,
    /// Markdown document handed to the server as its first argument.
    pub document: PathBuf,
    pub host: String,
    pub port: u16,
    pub settle: Duration,
}

impl SupervisorConfig {
    pub fn new(document: impl Into<PathBuf>) -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            document: document.into(),
            host: "0.0.0.0".to_string(),
            port: DEFAULT_RENDERER_PORT,
            settle: DEFAULT_SETTLE,
        }
    }

    /// `<document> --host <host> --port <port>`
    pub fn args(&self) -> Vec<String> {
        vec![
            self.document.display().to_string(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]
    }
}

/// Externally visible state of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorStatus {
    Stopped,
    Running {
        pid: Option<u32>,
        /// Number of successful spawns so far, this one included.
        generation: u64,
    },
}

impl SupervisorStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, SupervisorStatus::Running { .. })
    }
}

enum ProcessState {
    Stopped,
    Running { child: Child, generation: u64 },
}

struct Inner {
    config: SupervisorConfig,
    state: Mutex<ProcessState>,
    spawned: AtomicU64,
    attempts: AtomicU64,
    /// Restarts queued on or holding the state lock.
    pending: AtomicUsize,
}

/// Counts a restart as pending from when it is requested until it finishes
/// or is dropped.
struct PendingRestart(Arc<Inner>);

impl PendingRestart {
    fn enter(inner: &Arc<Inner>) -> Self {
        inner.pending.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(inner))
    }
}

impl Drop for PendingRestart {
    fn drop(&mut self) {
        self.0.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Cloneable handle owning the single rendering child process.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(ProcessState::Stopped),
                spawned: AtomicU64::new(0),
                attempts: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Bring the process up; identical to [`Supervisor::restart`].
    pub async fn start(&self) -> Result<SupervisorStatus, SupervisorError> {
        self.restart().await
    }

    /// Stop the current child (if any) and spawn a fresh one.
    ///
    /// Callers queue on the state lock in arrival order, so two concurrent
    /// restarts run one after the other and never overlap.
    pub async fn restart(&self) -> Result<SupervisorStatus, SupervisorError> {
        self.restart_pending(PendingRestart::enter(&self.inner)).await
    }

    async fn restart_pending(
        &self,
        _pending: PendingRestart,
    ) -> Result<SupervisorStatus, SupervisorError> {
        let mut state = self.inner.state.lock().await;
        let attempt = self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Renderer restart attempt {}", attempt);

        if stop_child(&mut state).await? {
            tokio::time::sleep(self.inner.config.settle).await;
        }

        let child = self.spawn()?;
        let pid = child.id();
        let generation = self.inner.spawned.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(
            "Renderer started (pid {:?}, generation {}) on port {}",
            pid,
            generation,
            self.inner.config.port
        );
        *state = ProcessState::Running { child, generation };

        Ok(SupervisorStatus::Running { pid, generation })
    }

    /// Restart on a detached task. Failures are logged, not returned.
    ///
    /// The restart counts as pending as soon as this returns.
    pub fn restart_in_background(&self) -> JoinHandle<()> {
        let supervisor = self.clone();
        let pending = PendingRestart::enter(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = supervisor.restart_pending(pending).await {
                tracing::error!("Renderer restart failed: {}", e);
            }
        })
    }

    /// Current state. A child that exited on its own is recorded as stopped.
    ///
    /// Waits for any in-flight restart to finish.
    pub async fn status(&self) -> SupervisorStatus {
        let mut state = self.inner.state.lock().await;
        poll_state(&mut state)
    }

    /// True while any restart is queued or running.
    ///
    /// Only restarts count; a concurrent [`Supervisor::status`] call does not.
    pub fn is_restarting(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst) > 0
    }

    /// Restarts that have acquired the lock so far, failed ones included.
    pub fn restart_attempts(&self) -> u64 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Stop the child and leave the supervisor stopped.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        let mut state = self.inner.state.lock().await;
        stop_child(&mut state).await?;
        Ok(())
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        let config = &self.inner.config;
        tracing::debug!("Spawning {} {:?}", config.program, config.args());

        let mut child = Command::new(&config.program)
            .args(config.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: config.program.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(stderr, "stderr"));
        }

        Ok(child)
    }
}

fn poll_state(state: &mut ProcessState) -> SupervisorStatus {
    if let ProcessState::Running { child, generation } = &mut *state {
        let running = SupervisorStatus::Running {
            pid: child.id(),
            generation: *generation,
        };
        match child.try_wait() {
            Ok(None) => return running,
            Ok(Some(exit)) => tracing::warn!("Renderer exited unexpectedly: {}", exit),
            Err(e) => {
                tracing::warn!("Could not poll renderer: {}", e);
                return running;
            }
        }
        *state = ProcessState::Stopped;
    }

    SupervisorStatus::Stopped
}

/// Kill and reap the running child. Returns whether there was one.
///
/// The state is `Stopped` afterwards even if the kill failed, since the
/// child handle is dropped (and `kill_on_drop` fires) either way.
async fn stop_child(state: &mut ProcessState) -> Result<bool, SupervisorError> {
    let previous = std::mem::replace(state, ProcessState::Stopped);
    let ProcessState::Running { mut child, generation } = previous else {
        return Ok(false);
    };

    let pid = child.id();
    tracing::info!("Stopping renderer (pid {:?}, generation {})", pid, generation);
    child
        .kill()
        .await
        .map_err(|source| SupervisorError::Kill { pid, source })?;

    Ok(true)
}

async fn forward_output<R>(stream: R, name: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!(target: OUTPUT_TARGET, stream = name, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(target: OUTPUT_TARGET, stream = name, "output closed: {}", e);
                break;
            }
        }
    }
}
