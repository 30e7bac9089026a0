//! Lifecycle error types.

use std::fmt;

use thiserror::Error;

use tideway_core::CommandError;

/// Provisioner operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    Deploy,
    DestroyService,
    TerminateMachine,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvisionStep::Deploy => "deploy",
            ProvisionStep::DestroyService => "destroy-service",
            ProvisionStep::TerminateMachine => "terminate-machine",
        })
    }
}

/// Errors from create/destroy orchestration.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Validation(#[from] tideway_app::AppError),

    #[error("state store error: {0}")]
    State(#[from] tideway_state::StateError),

    #[error("app not found: {0}")]
    NotFound(String),

    #[error("{step} failed for app {app}: {source}")]
    Provisioner {
        step: ProvisionStep,
        app: String,
        #[source]
        source: CommandError,
    },
}

impl LifecycleError {
    /// The failed provisioner step, if this is a provisioner failure.
    pub fn step(&self) -> Option<ProvisionStep> {
        match self {
            LifecycleError::Provisioner { step, .. } => Some(*step),
            _ => None,
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors from restart-hook handling.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("app {0} has no units")]
    NoUnits(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("app.conf output is missing the separator line")]
    MissingSeparator,

    #[error("failed to parse app.conf: {0}")]
    Parse(#[from] serde_yaml::Error),
}

pub type HookResult<T> = Result<T, HookError>;

/// Errors from repository cleanup.
#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("removing repository of {app} failed after {attempts} attempts: {source}")]
    Failed {
        app: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("cleanup queue is closed")]
    QueueClosed,
}
