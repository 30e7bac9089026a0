//! Subsystem wiring shared by every subcommand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context as _, bail};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tideway_core::TidewayConfig;
use tideway_lifecycle::{
    CleanupPolicy, CleanupQueue, FsRepositoryCleaner, HookRunner, JujuProvisioner, JujuShell,
    LifecycleController,
};
use tideway_state::{App, AppStore, StateStore};

/// How long shutdown waits for the cleanup queue once a call has timed out.
/// The timed-out call still holds a queue handle, so the worker cannot
/// drain on its own before that call returns.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Opened store plus the lifecycle services built on top of it.
pub struct Context {
    pub store: StateStore,
    pub controller: Arc<LifecycleController>,
    pub hooks: Arc<HookRunner>,
    timeout: Duration,
    timed_out: AtomicBool,
    cleanup_worker: JoinHandle<()>,
}

impl Context {
    /// Open the on-disk store and start the cleanup worker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &TidewayConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.state.data_dir).with_context(|| {
            format!("creating data dir {}", config.state.data_dir.display())
        })?;
        let db_path = config.state.db_path();
        let store = StateStore::open(&db_path)
            .with_context(|| format!("opening state store {}", db_path.display()))?;
        info!(path = %db_path.display(), "state store opened");

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: &TidewayConfig, store: StateStore) -> Self {
        let cleaner = Arc::new(FsRepositoryCleaner::new(config.git.bare_root.clone()));
        let (cleanup, cleanup_worker) =
            CleanupQueue::spawn(cleaner, CleanupPolicy::from(&config.cleanup));

        let controller = LifecycleController::new(
            Arc::new(store.clone()),
            Arc::new(JujuProvisioner::new(&config.provisioner)),
            cleanup,
        );
        let hooks = HookRunner::from_config(Arc::new(JujuShell::new(&config.provisioner)), config);

        Self {
            store,
            controller: Arc::new(controller),
            hooks: Arc::new(hooks),
            timeout: config.provisioner.timeout(),
            timed_out: AtomicBool::new(false),
            cleanup_worker,
        }
    }

    /// Load an App or fail with a readable error.
    pub fn app(&self, name: &str) -> anyhow::Result<App> {
        self.store
            .get_app(name)?
            .with_context(|| format!("app {name} not found"))
    }

    /// Run blocking work on the blocking pool, bounded by the provisioner
    /// timeout. A timed-out call keeps running in the background and is
    /// abandoned at shutdown.
    pub async fn blocking<T, F>(&self, what: &str, f: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let task = tokio::task::spawn_blocking(f);
        match tokio::time::timeout(self.timeout, task).await {
            Ok(joined) => joined.with_context(|| format!("{what} task failed"))?,
            Err(_) => {
                self.timed_out.store(true, Ordering::SeqCst);
                bail!("{what} timed out after {}s", self.timeout.as_secs())
            }
        }
    }

    /// Drop every queue handle and wait for pending cleanups to finish.
    ///
    /// After a timed-out call the wait is capped at [`DRAIN_GRACE`].
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self {
            controller,
            timed_out,
            mut cleanup_worker,
            ..
        } = self;
        drop(controller);
        debug!("draining cleanup queue");

        if !timed_out.into_inner() {
            cleanup_worker.await.context("cleanup worker panicked")?;
            return Ok(());
        }
        match tokio::time::timeout(DRAIN_GRACE, &mut cleanup_worker).await {
            Ok(joined) => joined.context("cleanup worker panicked")?,
            Err(_) => {
                warn!("a timed-out call still holds the cleanup queue, abandoning pending cleanups");
                cleanup_worker.abort();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> TidewayConfig {
        let mut config = TidewayConfig::default();
        config.state.data_dir = dir.join("state");
        config.git.bare_root = dir.join("repos");
        config.provisioner.timeout_secs = 1;
        config
    }

    #[tokio::test]
    async fn open_creates_data_dir_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let ctx = Context::open(&config).unwrap();
        assert!(config.state.db_path().exists());
        assert!(ctx.controller.list().unwrap().is_empty());

        ctx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn app_lookup_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::with_store(&config_in(dir.path()), StateStore::open_in_memory().unwrap());

        ctx.store.insert_app(&App::new("blog", "django")).unwrap();
        assert_eq!(ctx.app("blog").unwrap().framework, "django");
        assert!(ctx.app("ghost").unwrap_err().to_string().contains("not found"));

        ctx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn blocking_work_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::with_store(&config_in(dir.path()), StateStore::open_in_memory().unwrap());

        assert_eq!(ctx.blocking("add", || Ok(2 + 2)).await.unwrap(), 4);

        let err = ctx
            .blocking("sleep", || {
                std::thread::sleep(Duration::from_secs(2));
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        ctx.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn shutdown_is_prompt_after_timed_out_call() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::with_store(&config_in(dir.path()), StateStore::open_in_memory().unwrap());

        // Holding a controller clone keeps the cleanup queue open.
        let controller = ctx.controller.clone();
        let err = ctx
            .blocking("create", move || {
                std::thread::sleep(Duration::from_secs(4));
                drop(controller);
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));

        let started = std::time::Instant::now();
        ctx.shutdown().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }
}
