//! Provisioner client that turns deploy/destroy instructions into compute.

use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use tideway_core::config::ProvisionerConfig;
use tideway_core::{CommandResult, run_combined};

/// The external provisioning backend.
///
/// Every call blocks until the backend finishes and returns its combined
/// stdout/stderr. Non-zero exits surface as errors that still carry the
/// output.
pub trait ProvisionerClient: Send + Sync {
    fn deploy(&self, framework: &str, name: &str) -> CommandResult;

    fn destroy_service(&self, name: &str) -> CommandResult;

    fn terminate_machine(&self, machine: u32) -> CommandResult;
}

/// Provisioner backed by the `juju` command line tool.
#[derive(Debug, Clone)]
pub struct JujuProvisioner {
    binary: String,
    charms: PathBuf,
}

impl JujuProvisioner {
    pub fn new(config: &ProvisionerConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            charms: config.charms.clone(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

impl ProvisionerClient for JujuProvisioner {
    fn deploy(&self, framework: &str, name: &str) -> CommandResult {
        info!(framework, app = name, "deploying");
        run_combined(
            self.command()
                .arg("deploy")
                .arg(format!("--repository={}", self.charms.display()))
                .arg(format!("local:{framework}"))
                .arg(name),
        )
    }

    fn destroy_service(&self, name: &str) -> CommandResult {
        info!(app = name, "destroying service");
        run_combined(self.command().arg("destroy-service").arg(name))
    }

    fn terminate_machine(&self, machine: u32) -> CommandResult {
        info!(machine, "terminating machine");
        run_combined(self.command().arg("terminate-machine").arg(machine.to_string()))
    }
}
