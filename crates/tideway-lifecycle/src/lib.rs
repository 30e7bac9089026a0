//! tideway-lifecycle — app lifecycle orchestration.
//!
//! Composes the external collaborators (provisioner, unit shell, state
//! store, repository cleaner) into the create/destroy and restart-hook
//! workflows.
//!
//! # Architecture
//!
//! ```text
//! LifecycleController
//!   ├── AppStore (insert / update / remove App records)
//!   ├── ProvisionerClient (deploy, destroy-service, terminate-machine)
//!   └── CleanupQueue ── RepositoryCleaner (background, best-effort)
//!
//! HookRunner
//!   └── UnitShell (remote commands and named hooks on the primary unit)
//! ```
//!
//! Provisioner and shell calls block the calling thread until the external
//! process exits and cannot be cancelled. Async callers should run them on
//! the blocking pool and race them against a deadline.

pub mod cleanup;
pub mod controller;
pub mod error;
pub mod hooks;
pub mod provisioner;
pub mod shell;

pub use cleanup::{CleanupPolicy, CleanupQueue, CleanupTicket, FsRepositoryCleaner, RepositoryCleaner};
pub use controller::LifecycleController;
pub use error::{CleanupError, HookError, HookResult, LifecycleError, LifecycleResult, ProvisionStep};
pub use hooks::{AppConf, HookRunner};
pub use provisioner::{JujuProvisioner, ProvisionerClient};
pub use shell::{JujuShell, UnitShell};
