//! App aggregate error types.

use thiserror::Error;

/// Errors raised by App aggregate operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("team {team} already has access to app {app}")]
    TeamAlreadyGranted { team: String, app: String },

    #[error("team {team} does not have access to app {app}")]
    TeamNotGranted { team: String, app: String },

    #[error("environment variable {name} is not declared for app {app}")]
    EnvNotDeclared { name: String, app: String },

    #[error("invalid app name {0:?}: must start with a lowercase letter and contain only lowercase letters, digits and dashes (max 63 chars)")]
    InvalidName(String),

    #[error("state store error: {0}")]
    State(#[from] tideway_state::StateError),
}

impl AppError {
    /// True for errors caused by the request itself rather than the store.
    pub fn is_validation(&self) -> bool {
        !matches!(self, AppError::State(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
