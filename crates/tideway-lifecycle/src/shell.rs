//! Remote command channel to a running unit.

use std::path::PathBuf;
use std::process::Command;

use tracing::debug;

use tideway_core::config::ProvisionerConfig;
use tideway_core::{CommandResult, run_combined};
use tideway_state::Unit;

/// Runs commands on a unit.
pub trait UnitShell: Send + Sync {
    /// Run an arbitrary command on `unit`, returning its combined output.
    fn command(&self, unit: &Unit, args: &[&str]) -> CommandResult;

    /// Run a named platform hook on `unit`.
    fn execute_hook(&self, unit: &Unit, hook: &str) -> CommandResult;
}

/// Unit shell over `juju ssh`, addressing units by machine id.
#[derive(Debug, Clone)]
pub struct JujuShell {
    binary: String,
    hooks_dir: PathBuf,
}

impl JujuShell {
    pub fn new(config: &ProvisionerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            hooks_dir: config.hooks_dir.clone(),
        }
    }
}

impl UnitShell for JujuShell {
    fn command(&self, unit: &Unit, args: &[&str]) -> CommandResult {
        debug!(unit = %unit.instance_id, machine = unit.machine, ?args, "unit command");
        run_combined(
            Command::new(&self.binary)
                .args(["ssh", "-o", "StrictHostKeyChecking no", "-q"])
                .arg(unit.machine.to_string())
                .args(args),
        )
    }

    fn execute_hook(&self, unit: &Unit, hook: &str) -> CommandResult {
        let path = self.hooks_dir.join(hook).to_string_lossy().into_owned();
        self.command(unit, &[path.as_str()])
    }
}
