//! Restart hooks: user scripts run around an app restart.
//!
//! Users declare hooks in an `app.conf` YAML file at the root of their
//! repository:
//!
//! ```yaml
//! pre-restart: deploy/pre.sh
//! pos-restart: deploy/pos.sh
//! ```
//!
//! The file is read over the unit shell, the scripts run on the app's
//! primary unit with `/bin/bash`, and every step is recorded in the app
//! log. The runner only touches the in-memory App; callers persist it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use tideway_core::CommandResult;
use tideway_core::config::TidewayConfig;
use tideway_state::{App, Unit};

use crate::error::{HookError, HookResult};
use crate::shell::UnitShell;

/// Printed before the file contents so shell noise can be split off.
pub const CONF_SEPARATOR: &str = "========";

/// Name of the hook configuration file, relative to the repository root.
pub const CONF_FILE: &str = "app.conf";

/// Platform hook run before the reload hook in `update_hooks`.
const DEPENDENCIES_HOOK: &str = "dependencies";

/// Platform hook that restarts the app process.
const RESTART_HOOK: &str = "restart";

/// Parsed `app.conf`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AppConf {
    #[serde(rename = "pre-restart", default)]
    pub pre_restart: Option<String>,
    #[serde(rename = "pos-restart", default)]
    pub pos_restart: Option<String>,
}

impl AppConf {
    pub fn pre_restart(&self) -> Option<&str> {
        self.pre_restart.as_deref().filter(|p| !p.is_empty())
    }

    pub fn pos_restart(&self) -> Option<&str> {
        self.pos_restart.as_deref().filter(|p| !p.is_empty())
    }

    pub fn has_restart_hooks(&self) -> bool {
        self.pre_restart().is_some() || self.pos_restart().is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Pre,
    Pos,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Pre => "pre-restart",
            Phase::Pos => "pos-restart",
        }
    }

    fn script(self, conf: &AppConf) -> Option<&str> {
        match self {
            Phase::Pre => conf.pre_restart(),
            Phase::Pos => conf.pos_restart(),
        }
    }
}

/// Split the separator-prefixed command output and parse what follows it.
pub fn parse_conf_output(output: &str) -> HookResult<AppConf> {
    let (_, document) = output
        .split_once(CONF_SEPARATOR)
        .ok_or(HookError::MissingSeparator)?;
    if document.trim().is_empty() {
        return Ok(AppConf::default());
    }
    Ok(serde_yaml::from_str(document)?)
}

/// Fetches `app.conf` and runs restart hooks on an app's primary unit.
pub struct HookRunner {
    shell: Arc<dyn UnitShell>,
    /// Repository root on the unit.
    unit_repo: PathBuf,
    reload_hook: String,
}

impl HookRunner {
    pub fn new(shell: Arc<dyn UnitShell>, unit_repo: impl Into<PathBuf>, reload_hook: &str) -> Self {
        Self {
            shell,
            unit_repo: unit_repo.into(),
            reload_hook: reload_hook.to_string(),
        }
    }

    pub fn from_config(shell: Arc<dyn UnitShell>, config: &TidewayConfig) -> Self {
        Self::new(
            shell,
            config.git.unit_repo.clone(),
            &config.provisioner.reload_hook,
        )
    }

    /// Absolute path on the unit for a repository-relative hook path.
    pub fn hook_path(&self, script: &str) -> PathBuf {
        self.unit_repo.join(script.trim_start_matches('/'))
    }

    fn conf_path(&self) -> PathBuf {
        self.unit_repo.join(CONF_FILE)
    }

    /// Read the app's hook configuration.
    ///
    /// A failing remote command (or an app without units) is logged and
    /// yields an empty configuration, so an unreachable unit never blocks
    /// the restart. Unparseable output is logged and returned as an error.
    pub fn fetch_conf(&self, app: &mut App) -> HookResult<AppConf> {
        let Some(unit) = app.primary_unit().cloned() else {
            app.append_log("App has no units to read app.conf from... Skipping hooks execution");
            return Ok(AppConf::default());
        };

        let cmd = format!(
            r#"echo "{CONF_SEPARATOR}";cat {}"#,
            self.conf_path().display()
        );
        let output = match self.shell.command(&unit, &[cmd.as_str()]) {
            Ok(output) => output,
            Err(e) => {
                app.append_log(format!(
                    "Got error while executing command: {e}... Skipping hooks execution"
                ));
                return Ok(AppConf::default());
            }
        };

        parse_conf_output(&output).inspect_err(|e| {
            app.append_log(format!("Got error while parsing yaml: {e}"));
        })
    }

    /// Run the user's pre-restart script, if any.
    pub fn pre_restart(&self, app: &mut App, conf: &AppConf) -> HookResult<()> {
        self.run_phase(app, conf, Phase::Pre)
    }

    /// Run the user's pos-restart script, if any.
    pub fn pos_restart(&self, app: &mut App, conf: &AppConf) -> HookResult<()> {
        self.run_phase(app, conf, Phase::Pos)
    }

    fn run_phase(&self, app: &mut App, conf: &AppConf, phase: Phase) -> HookResult<()> {
        if !conf.has_restart_hooks() {
            app.append_log("app.conf file does not exist or is not in the right place. Skipping...");
            return Ok(());
        }
        let Some(script) = phase.script(conf) else {
            app.append_log(format!(
                "{} hook section in app conf does not exist... Skipping...",
                phase.label()
            ));
            return Ok(());
        };

        let unit = primary_unit(app)?;
        let path = self.hook_path(script);
        app.append_log(format!("Executing {} hook...", phase.label()));
        let result = self.run_script(&unit, &path);
        app.append_log(format!(
            "Output of {} hook: {}",
            phase.label(),
            output_of(&result)
        ));
        result.map(drop).map_err(HookError::from)
    }

    fn run_script(&self, unit: &Unit, path: &Path) -> CommandResult {
        let path = path.to_string_lossy();
        self.shell.command(unit, &["/bin/bash", path.as_ref()])
    }

    /// Run the dependency and reload platform hooks, stopping at the first failure.
    pub fn update_hooks(&self, app: &mut App) -> HookResult<()> {
        let unit = primary_unit(app)?;
        for hook in [DEPENDENCIES_HOOK, self.reload_hook.as_str()] {
            self.execute_logged(app, &unit, hook)?;
        }
        Ok(())
    }

    /// Full restart: pre-restart script, restart hook, pos-restart script.
    pub fn restart(&self, app: &mut App) -> HookResult<()> {
        let conf = self.fetch_conf(app)?;
        self.pre_restart(app, &conf)?;
        let unit = primary_unit(app)?;
        self.execute_logged(app, &unit, RESTART_HOOK)?;
        self.pos_restart(app, &conf)
    }

    fn execute_logged(&self, app: &mut App, unit: &Unit, hook: &str) -> HookResult<()> {
        app.append_log(format!("executing hook {hook}"));
        let result = self.shell.execute_hook(unit, hook);
        app.append_log(output_of(&result));
        if let Err(e) = &result {
            warn!(app = %app.name, hook, error = %e, "hook failed");
        }
        result.map(drop).map_err(HookError::from)
    }
}

fn primary_unit(app: &App) -> HookResult<Unit> {
    app.primary_unit()
        .cloned()
        .ok_or_else(|| HookError::NoUnits(app.name.clone()))
}

fn output_of(result: &CommandResult) -> String {
    match result {
        Ok(output) => output.clone(),
        Err(e) => e.output().to_string(),
    }
}
