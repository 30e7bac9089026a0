//! App create/destroy orchestration.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use tideway_app::validate_name;
use tideway_state::{App, AppState, AppStore};

use crate::cleanup::CleanupQueue;
use crate::error::{LifecycleError, LifecycleResult, ProvisionStep};
use crate::provisioner::ProvisionerClient;

/// Drives Apps through provisioning and teardown.
///
/// Every method blocks on the store and on the provisioner process.
pub struct LifecycleController {
    store: Arc<dyn AppStore>,
    provisioner: Arc<dyn ProvisionerClient>,
    cleanup: CleanupQueue,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn AppStore>,
        provisioner: Arc<dyn ProvisionerClient>,
        cleanup: CleanupQueue,
    ) -> Self {
        Self {
            store,
            provisioner,
            cleanup,
        }
    }

    /// Persist a new App and deploy it.
    ///
    /// On deploy failure the App stays persisted in `PENDING` with the
    /// provisioner output in its log.
    #[instrument(skip(self, app), fields(app = %app.name, framework = %app.framework))]
    pub fn create(&self, app: &mut App) -> LifecycleResult<()> {
        validate_name(&app.name)?;
        app.state = AppState::Pending;
        self.store.insert_app(app)?;

        let msg = format!("creating app {}", app.name);
        self.record(app, msg)?;

        let result = self.provisioner.deploy(&app.framework, &app.name);
        let output = match &result {
            Ok(output) => output.clone(),
            Err(e) => e.output().to_string(),
        };
        debug!(%output, "deploy finished");

        match result {
            Ok(_) => {
                self.record(app, output)?;
                let msg = format!("app {} successfully created", app.name);
                self.record(app, msg)?;
                info!("app created");
                Ok(())
            }
            Err(source) => {
                if let Err(e) = self.record(app, output) {
                    warn!(error = %e, "failed to persist deploy output");
                }
                Err(LifecycleError::Provisioner {
                    step: ProvisionStep::Deploy,
                    app: app.name.clone(),
                    source,
                })
            }
        }
    }

    /// Remove the App record, queue repository cleanup, and tear down the
    /// provisioned service and its machine.
    ///
    /// The record is gone even if a provisioner step fails afterwards.
    #[instrument(skip(self, app), fields(app = %app.name))]
    pub fn destroy(&self, app: &App) -> LifecycleResult<()> {
        if !self.store.remove_app(&app.name)? {
            return Err(LifecycleError::NotFound(app.name.clone()));
        }
        debug!("app record removed");

        drop(self.cleanup.dispatch(&app.name));

        let output = self
            .provisioner
            .destroy_service(&app.name)
            .map_err(|source| LifecycleError::Provisioner {
                step: ProvisionStep::DestroyService,
                app: app.name.clone(),
                source,
            })?;
        debug!(%output, "destroy-service finished");

        let Some(unit) = app.primary_unit() else {
            warn!("app has no units, skipping terminate-machine");
            return Ok(());
        };
        let output = self
            .provisioner
            .terminate_machine(unit.machine)
            .map_err(|source| LifecycleError::Provisioner {
                step: ProvisionStep::TerminateMachine,
                app: app.name.clone(),
                source,
            })?;
        debug!(machine = unit.machine, %output, "terminate-machine finished");

        info!("app destroyed");
        Ok(())
    }

    pub fn get(&self, name: &str) -> LifecycleResult<App> {
        self.store
            .get_app(name)?
            .ok_or_else(|| LifecycleError::NotFound(name.to_string()))
    }

    pub fn list(&self) -> LifecycleResult<Vec<App>> {
        Ok(self.store.list_apps()?)
    }

    /// Apps the team has been granted access to.
    pub fn apps_for_team(&self, team: &str) -> LifecycleResult<Vec<App>> {
        Ok(tideway_app::apps_for_team(self.store.as_ref(), team)?)
    }

    /// Persist a changed App, such as after a hook run or env change.
    pub fn save(&self, app: &mut App) -> LifecycleResult<()> {
        Ok(self.store.update_app(app)?)
    }

    fn record(&self, app: &mut App, message: String) -> LifecycleResult<()> {
        app.append_log(message);
        self.store.update_app(app)?;
        Ok(())
    }
}
