//! tideway-state — app aggregate and embedded state store for Tideway.
//!
//! Backed by [redb](https://docs.rs/redb), persists App aggregates and
//! teams. Callers depend on the [`AppStore`] and [`TeamStore`] ports so
//! tests and alternative backends can be injected.
//!
//! # Architecture
//!
//! Every App is stored as a single JSON document under its name. Updates
//! replace the whole document and are guarded by the aggregate's
//! `version` counter, so two workflows mutating the same App cannot
//! silently overwrite each other.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads and async tasks.

pub mod error;
pub mod ports;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use ports::{AppStore, TeamStore};
pub use store::StateStore;
pub use types::*;
