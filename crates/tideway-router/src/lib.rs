//! Tideway routing — live traffic routing for deployed apps.
//!
//! The routing table is the one structure in the control plane that many
//! independent scaling workflows mutate at once, for different apps and
//! for the same app. It provides its own mutual exclusion; every operation
//! is linearizable per app name.
//!
//! # Components
//!
//! - **`table`** — `RoutingTable`, the concurrent name → endpoint-set map
//! - **`sync`** — rebuild an app's routes from its unit list

pub mod sync;
pub mod table;

pub use sync::{sync_app, unsync_app};
pub use table::{Router, RoutingTable};
