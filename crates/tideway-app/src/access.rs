//! Team-based access control for apps.
//!
//! `teams` is semantically a set: grants reject duplicates and revokes use
//! swap-remove, so iteration order after a revoke is unspecified.

use tracing::{debug, info};

use tideway_state::{App, AppStore, TeamStore, User};

use crate::error::{AppError, AppResult};

/// Give `team` access to the app.
pub fn grant_access(app: &mut App, team: &str) -> AppResult<()> {
    if app.has_team(team) {
        return Err(AppError::TeamAlreadyGranted {
            team: team.to_string(),
            app: app.name.clone(),
        });
    }
    app.teams.push(team.to_string());
    info!(app = %app.name, team, "access granted");
    Ok(())
}

/// Take access away from `team`.
pub fn revoke_access(app: &mut App, team: &str) -> AppResult<()> {
    let index = app
        .teams
        .iter()
        .position(|t| t == team)
        .ok_or_else(|| AppError::TeamNotGranted {
            team: team.to_string(),
            app: app.name.clone(),
        })?;
    app.teams.swap_remove(index);
    info!(app = %app.name, team, "access revoked");
    Ok(())
}

/// True iff some team with access to the app has `user` as a member.
pub fn check_user_access(teams: &dyn TeamStore, app: &App, user: &User) -> AppResult<bool> {
    let resolved = teams.teams_named(&app.teams)?;
    let allowed = resolved.iter().any(|team| team.contains_user(user));
    debug!(app = %app.name, user = %user.email, allowed, "checked user access");
    Ok(allowed)
}

/// All apps `team` has access to.
pub fn apps_for_team(store: &dyn AppStore, team: &str) -> AppResult<Vec<App>> {
    Ok(store.find_apps(&|app: &App| app.has_team(team))?)
}
