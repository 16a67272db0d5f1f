//! Worker supervision.
//!
//! Two kinds of task share one lifecycle (`start`, `stop`, `is_running`):
//!
//! - [`TaskSpec::IsolatedWorker`]: a child process, normally the
//!   `yolo-worker` binary. Stopping sends SIGTERM and waits a bounded time
//!   for the worker to drain its in-flight job.
//! - [`TaskSpec::BackgroundConsumer`]: a downstream event consumer on its
//!   own OS thread with a single-threaded Tokio runtime. `stop` leaves it
//!   running; consumers end with the process, or earlier when
//!   [`Supervisor::shutdown_consumers`] is called on the way out.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use yolo_events::{AnalyticsTally, BillingLedger, BrokerConfig, DownstreamConsumer};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to signal {name}: {source}")]
    Signal {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which downstream consumer a background task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerKind {
    Billing,
    Analytics,
}

impl ConsumerKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Billing => "billing-consumer",
            Self::Analytics => "analytics-consumer",
        }
    }
}

/// What to start.
#[derive(Debug, Clone)]
pub enum TaskSpec {
    IsolatedWorker {
        program: PathBuf,
        args: Vec<OsString>,
    },
    BackgroundConsumer(ConsumerKind),
}

impl TaskSpec {
    /// The worker binary with no arguments.
    pub fn worker(program: impl Into<PathBuf>) -> Self {
        Self::IsolatedWorker {
            program: program.into(),
            args: Vec::new(),
        }
    }
}

/// A started task.
pub struct TaskHandle {
    name: String,
    kind: HandleKind,
}

enum HandleKind {
    Process(Child),
    Thread(std::thread::JoinHandle<()>),
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, for worker processes that have not been reaped.
    pub fn pid(&self) -> Option<u32> {
        match &self.kind {
            HandleKind::Process(child) => child.id(),
            HandleKind::Thread(_) => None,
        }
    }
}

/// Result of [`Supervisor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process exited after SIGTERM.
    Exited(ExitStatus),
    /// The process had already exited before `stop`.
    AlreadyExited(ExitStatus),
    /// The process was still running when the stop timeout expired.
    TimedOut,
    /// A background consumer; it keeps running until process exit.
    Detached,
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

pub struct Supervisor {
    broker: BrokerConfig,
    stop_timeout: Duration,
    consumers: CancellationToken,
}

impl Supervisor {
    pub fn new(broker: BrokerConfig, stop_timeout: Duration) -> Self {
        Self {
            broker,
            stop_timeout,
            consumers: CancellationToken::new(),
        }
    }

    pub fn start(&self, spec: TaskSpec) -> Result<TaskHandle, SupervisorError> {
        match spec {
            TaskSpec::IsolatedWorker { program, args } => {
                let name = program
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| program.display().to_string());

                let child = Command::new(&program)
                    .args(&args)
                    .spawn()
                    .map_err(|source| SupervisorError::Spawn {
                        name: name.clone(),
                        source,
                    })?;

                tracing::info!(task = %name, pid = ?child.id(), "Worker process started");
                Ok(TaskHandle {
                    name,
                    kind: HandleKind::Process(child),
                })
            }
            TaskSpec::BackgroundConsumer(kind) => self.start_consumer(kind),
        }
    }

    /// Start the background consumers, then the worker process.
    ///
    /// The worker is spawned last so that no child process is left behind
    /// when an earlier start fails. If the worker cannot be spawned, the
    /// consumers already running are cancelled before the error is returned.
    pub fn start_all(
        &self,
        worker: TaskSpec,
        consumers: &[ConsumerKind],
    ) -> Result<(TaskHandle, Vec<TaskHandle>), SupervisorError> {
        let mut started = Vec::with_capacity(consumers.len());
        for &kind in consumers {
            match self.start_consumer(kind) {
                Ok(handle) => started.push(handle),
                Err(e) => {
                    self.shutdown_consumers();
                    return Err(e);
                }
            }
        }

        match self.start(worker) {
            Ok(handle) => Ok((handle, started)),
            Err(e) => {
                self.shutdown_consumers();
                Err(e)
            }
        }
    }

    /// Stop a task. See [`StopOutcome`] for what each kind does.
    pub async fn stop(&self, handle: &mut TaskHandle) -> Result<StopOutcome, SupervisorError> {
        let name = handle.name.clone();
        match &mut handle.kind {
            HandleKind::Process(child) => {
                if let Ok(Some(status)) = child.try_wait() {
                    tracing::info!(task = %name, %status, "Worker already exited");
                    return Ok(StopOutcome::AlreadyExited(status));
                }

                terminate(child).map_err(|source| SupervisorError::Signal {
                    name: name.clone(),
                    source,
                })?;

                match tokio::time::timeout(self.stop_timeout, child.wait()).await {
                    Ok(Ok(status)) => {
                        tracing::info!(task = %name, %status, "Worker stopped");
                        Ok(StopOutcome::Exited(status))
                    }
                    Ok(Err(source)) => Err(SupervisorError::Signal { name, source }),
                    Err(_) => {
                        tracing::warn!(
                            task = %name,
                            timeout_secs = self.stop_timeout.as_secs_f64(),
                            "Worker did not stop in time, giving up"
                        );
                        Ok(StopOutcome::TimedOut)
                    }
                }
            }
            HandleKind::Thread(_) => {
                tracing::debug!(task = %name, "Background consumer left running");
                Ok(StopOutcome::Detached)
            }
        }
    }

    /// Whether the task is still alive.
    pub fn is_running(handle: &mut TaskHandle) -> bool {
        match &mut handle.kind {
            HandleKind::Process(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(_)) => false,
                Err(e) => {
                    tracing::warn!(task = %handle.name, error = %e, "Cannot poll worker status");
                    false
                }
            },
            HandleKind::Thread(thread) => !thread.is_finished(),
        }
    }

    /// Cancel every background consumer started by this supervisor.
    ///
    /// Consumers close their broker connection and their threads exit. The
    /// threads are not joined.
    pub fn shutdown_consumers(&self) {
        self.consumers.cancel();
    }

    fn start_consumer(&self, kind: ConsumerKind) -> Result<TaskHandle, SupervisorError> {
        let name = kind.name().to_string();
        let token = self.consumers.child_token();
        let broker = self.broker.clone();
        let thread_name = name.clone();

        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        tracing::error!(task = %thread_name, error = %e, "Failed to build consumer runtime");
                        return;
                    }
                };

                runtime.block_on(async move {
                    match kind {
                        ConsumerKind::Billing => {
                            DownstreamConsumer::new(broker, BillingLedger::default())
                                .run(token)
                                .await
                        }
                        ConsumerKind::Analytics => {
                            DownstreamConsumer::new(broker, AnalyticsTally::default())
                                .run(token)
                                .await
                        }
                    }
                });
            })
            .map_err(|source| SupervisorError::Spawn {
                name: name.clone(),
                source,
            })?;

        tracing::info!(task = %name, "Background consumer started");
        Ok(TaskHandle {
            name,
            kind: HandleKind::Thread(thread),
        })
    }
}

/// Ask a child process to shut down.
#[cfg(unix)]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}
