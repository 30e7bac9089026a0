//! App name validation.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{0,62}$").expect("app name regex"));

/// App names double as provisioner service names and repository names.
pub fn validate_name(name: &str) -> AppResult<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(AppError::InvalidName(name.to_string()))
    }
}
