//! tideway-app — operations on the App aggregate.
//!
//! Every function here mutates an in-memory [`App`](tideway_state::App) and
//! leaves persistence to the caller, who is also responsible for
//! serializing mutations per App (the store's version check reports any
//! write that raced another).
//!
//! # Components
//!
//! - **`units`** — merge unit status reports into the unit list
//! - **`access`** — team grants and user access checks
//! - **`env`** — environment variable management
//! - **`name`** — app name validation

pub mod access;
pub mod env;
pub mod error;
pub mod name;
pub mod units;

pub use access::{apps_for_team, check_user_access, grant_access, revoke_access};
pub use env::{get_env, set_env, unset_env};
pub use error::{AppError, AppResult};
pub use name::validate_name;
pub use units::add_or_update_unit;
