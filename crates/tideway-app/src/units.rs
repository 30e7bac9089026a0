//! Unit reconciliation: merges unit status reports into an App.

use tracing::debug;

use tideway_state::{App, Unit};

/// Merge `unit` into the App's unit list.
///
/// A unit whose `instance_id` is already present has its `ip`,
/// `agent_state` and `instance_state` overwritten in place; list order,
/// length and `machine` are preserved. Otherwise the unit is appended.
pub fn add_or_update_unit(app: &mut App, unit: Unit) {
    if let Some(existing) = app
        .units
        .iter_mut()
        .find(|u| u.instance_id == unit.instance_id)
    {
        existing.ip = unit.ip;
        existing.agent_state = unit.agent_state;
        existing.instance_state = unit.instance_state;
        debug!(app = %app.name, instance = %existing.instance_id, "unit updated");
        return;
    }

    debug!(app = %app.name, instance = %unit.instance_id, "unit added");
    app.units.push(unit);
}
