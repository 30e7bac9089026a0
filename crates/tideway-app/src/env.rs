//! Environment variable management.

use tideway_state::{App, EnvVar};

use crate::error::{AppError, AppResult};

/// Set (or overwrite) a variable and record it in the app log.
///
/// The log entry carries the plaintext value even for private variables;
/// only the `Display` rendering masks it.
pub fn set_env(app: &mut App, name: &str, value: &str, public: bool) {
    app.env.insert(
        name.to_string(),
        EnvVar {
            name: name.to_string(),
            value: value.to_string(),
            public,
            service_name: None,
        },
    );
    app.append_log(format!("setting env {name} with value {value}"));
}

/// Look up a declared variable.
pub fn get_env<'a>(app: &'a App, name: &str) -> AppResult<&'a EnvVar> {
    app.env.get(name).ok_or_else(|| AppError::EnvNotDeclared {
        name: name.to_string(),
        app: app.name.clone(),
    })
}

/// Remove a declared variable, returning it.
pub fn unset_env(app: &mut App, name: &str) -> AppResult<EnvVar> {
    let removed = app.env.remove(name).ok_or_else(|| AppError::EnvNotDeclared {
        name: name.to_string(),
        app: app.name.clone(),
    })?;
    app.append_log(format!("unsetting env {name}"));
    Ok(removed)
}
