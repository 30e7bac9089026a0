//! Storage ports consumed by the rest of the control plane.
//!
//! [`StateStore`](crate::StateStore) implements both traits; tests may
//! supply their own.

use crate::error::StateResult;
use crate::types::{App, Team};

/// Keyed document store over App aggregates.
pub trait AppStore: Send + Sync {
    /// Insert a new App. Fails with `AlreadyExists` if the name is taken.
    fn insert_app(&self, app: &App) -> StateResult<()>;

    fn get_app(&self, name: &str) -> StateResult<Option<App>>;

    /// All Apps for which `predicate` returns true.
    fn find_apps(&self, predicate: &dyn Fn(&App) -> bool) -> StateResult<Vec<App>>;

    /// Remove an App by name. Returns true if it existed.
    fn remove_app(&self, name: &str) -> StateResult<bool>;

    /// Replace the stored document.
    ///
    /// Succeeds only if the stored version equals `app.version`; on success
    /// both the stored document and `app` carry the bumped version.
    fn update_app(&self, app: &mut App) -> StateResult<()>;

    fn list_apps(&self) -> StateResult<Vec<App>> {
        self.find_apps(&|_: &App| true)
    }
}

/// Lookup of teams by name.
pub trait TeamStore: Send + Sync {
    fn put_team(&self, team: &Team) -> StateResult<()>;

    fn get_team(&self, name: &str) -> StateResult<Option<Team>>;

    /// The teams among `names` that exist. Unknown names are skipped.
    fn teams_named(&self, names: &[String]) -> StateResult<Vec<Team>>;
}
