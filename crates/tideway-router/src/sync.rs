//! Route synchronization between the App aggregate and the routing table.

use tracing::debug;

use tideway_state::App;

use crate::table::{Router, RoutingTable};

/// Make the app's routes match its units' addresses.
///
/// Units without an IP (not yet reported by the provisioner) are skipped.
/// Returns the number of backends now routed.
pub fn sync_app(table: &RoutingTable, app: &App) -> usize {
    let addresses: Vec<String> = app
        .units
        .iter()
        .filter(|u| !u.ip.is_empty())
        .map(|u| u.ip.clone())
        .collect();
    let count = addresses.len();
    table.replace_routes(&app.name, addresses);

    debug!(app = %app.name, backends = count, "synced app routes");
    count
}

/// Remove an app from the routing table.
pub fn unsync_app(table: &RoutingTable, name: &str) -> bool {
    table.remove_route(name)
}
