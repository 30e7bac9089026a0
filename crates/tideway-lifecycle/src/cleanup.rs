//! Background repository cleanup.
//!
//! Destroying an app removes its bare git repository from the repository
//! host. That removal is slow and must never hold up the destroy call, so
//! it is queued to a single worker task. Callers get a [`CleanupTicket`]
//! they may await or drop; failures are retried per [`CleanupPolicy`] and
//! otherwise only logged.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tideway_app::validate_name;
use tideway_core::config::CleanupConfig;

use crate::error::CleanupError;

/// Removes an app's source repository.
pub trait RepositoryCleaner: Send + Sync {
    /// Remove the repository of `app`. Removing a missing repository succeeds.
    fn remove_repository(&self, app: &str) -> io::Result<()>;
}

/// Cleaner for bare repositories laid out as `<bare_root>/<app>.git`.
#[derive(Debug, Clone)]
pub struct FsRepositoryCleaner {
    bare_root: PathBuf,
}

impl FsRepositoryCleaner {
    pub fn new(bare_root: impl Into<PathBuf>) -> Self {
        Self {
            bare_root: bare_root.into(),
        }
    }

    pub fn bare_path(&self, app: &str) -> PathBuf {
        self.bare_root.join(format!("{app}.git"))
    }
}

impl RepositoryCleaner for FsRepositoryCleaner {
    fn remove_repository(&self, app: &str) -> io::Result<()> {
        // The name becomes a path component; anything else could escape
        // `bare_root`.
        validate_name(app).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let path = self.bare_path(app);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                info!(app, path = %path.display(), "bare repository removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(app, path = %path.display(), "bare repository already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Retry behaviour for cleanup jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Total attempts per job, including the first. Zero behaves as one.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::from(&CleanupConfig::default())
    }
}

impl From<&CleanupConfig> for CleanupPolicy {
    fn from(config: &CleanupConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_delay: config.retry_delay(),
        }
    }
}

struct CleanupJob {
    app: String,
    done: oneshot::Sender<Result<(), CleanupError>>,
}

/// Handle to the cleanup worker. Cloning shares the same worker.
///
/// The worker exits once every handle is dropped and the queue is drained.
#[derive(Clone)]
pub struct CleanupQueue {
    tx: UnboundedSender<CleanupJob>,
}

impl CleanupQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(
        cleaner: Arc<dyn RepositoryCleaner>,
        policy: CleanupPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = unbounded_channel();
        let handle = tokio::spawn(run_worker(rx, cleaner, policy));
        (Self { tx }, handle)
    }

    /// Queue removal of `app`'s repository without waiting for it.
    pub fn dispatch(&self, app: &str) -> CleanupTicket {
        let (done, rx) = oneshot::channel();
        let job = CleanupJob {
            app: app.to_string(),
            done,
        };
        if self.tx.send(job).is_err() {
            // The job (and its sender) is dropped, so the ticket reports
            // the closed queue.
            warn!(app, "cleanup worker is gone, repository left in place");
        } else {
            debug!(app, "repository cleanup queued");
        }
        CleanupTicket { rx }
    }
}

/// Completion of one dispatched cleanup job.
#[must_use = "drop the ticket explicitly to detach from the cleanup"]
pub struct CleanupTicket {
    rx: oneshot::Receiver<Result<(), CleanupError>>,
}

impl CleanupTicket {
    /// Wait for the job to finish, including retries.
    pub async fn wait(self) -> Result<(), CleanupError> {
        self.rx.await.unwrap_or(Err(CleanupError::QueueClosed))
    }
}

async fn run_worker(
    mut rx: UnboundedReceiver<CleanupJob>,
    cleaner: Arc<dyn RepositoryCleaner>,
    policy: CleanupPolicy,
) {
    debug!("cleanup worker started");
    while let Some(job) = rx.recv().await {
        let result = clean_with_retries(&cleaner, &policy, &job.app).await;
        if let Err(e) = &result {
            warn!(app = %job.app, error = %e, "repository cleanup failed");
        }
        // The caller may have dropped its ticket.
        let _ = job.done.send(result);
    }
    debug!("cleanup worker stopped");
}

async fn clean_with_retries(
    cleaner: &Arc<dyn RepositoryCleaner>,
    policy: &CleanupPolicy,
    app: &str,
) -> Result<(), CleanupError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let cleaner = Arc::clone(cleaner);
        let name = app.to_string();
        let result = tokio::task::spawn_blocking(move || cleaner.remove_repository(&name))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e.to_string())));

        match result {
            Ok(()) => return Ok(()),
            Err(source) if attempt >= attempts || source.kind() == io::ErrorKind::InvalidInput => {
                return Err(CleanupError::Failed {
                    app: app.to_string(),
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                debug!(app, attempt, error = %e, "repository cleanup attempt failed, retrying");
                tokio::time::sleep(policy.retry_delay).await;
            }
        }
    }
}
