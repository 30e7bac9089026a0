//! redb-backed persistence for Tideway.
//!
//! Provides the [`AppStore`] and [`TeamStore`] ports. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::ports::{AppStore, TeamStore};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(APPS).map_err(map_err!(Table))?;
        txn.open_table(TEAMS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        table: TableDefinition<'static, &'static str, &'static [u8]>,
        key: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

// ── Apps ───────────────────────────────────────────────────────────

impl AppStore for StateStore {
    fn insert_app(&self, app: &App) -> StateResult<()> {
        let value = serde_json::to_vec(app).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(APPS).map_err(map_err!(Table))?;
            let exists = table
                .get(app.name.as_str())
                .map_err(map_err!(Read))?
                .is_some();
            if exists {
                return Err(StateError::AlreadyExists(app.name.clone()));
            }
            table
                .insert(app.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app = %app.name, "app inserted");
        Ok(())
    }

    fn get_app(&self, name: &str) -> StateResult<Option<App>> {
        self.get_json(APPS, name)
    }

    fn find_apps(&self, predicate: &dyn Fn(&App) -> bool) -> StateResult<Vec<App>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(APPS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let app: App = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if predicate(&app) {
                results.push(app);
            }
        }
        Ok(results)
    }

    fn remove_app(&self, name: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(APPS).map_err(map_err!(Table))?;
            existed = table.remove(name).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(app = %name, existed, "app removed");
        Ok(existed)
    }

    fn update_app(&self, app: &mut App) -> StateResult<()> {
        let next_version = app.version + 1;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(APPS).map_err(map_err!(Table))?;
            let stored_version = match table.get(app.name.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    let stored: App =
                        serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                    stored.version
                }
                None => return Err(StateError::NotFound(app.name.clone())),
            };
            if stored_version != app.version {
                return Err(StateError::Conflict {
                    name: app.name.clone(),
                    expected: app.version,
                    found: stored_version,
                });
            }

            let mut next = app.clone();
            next.version = next_version;
            let value = serde_json::to_vec(&next).map_err(map_err!(Serialize))?;
            table
                .insert(app.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        app.version = next_version;
        debug!(app = %app.name, version = next_version, "app updated");
        Ok(())
    }
}

// ── Teams ──────────────────────────────────────────────────────────

impl TeamStore for StateStore {
    fn put_team(&self, team: &Team) -> StateResult<()> {
        let value = serde_json::to_vec(team).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
            table
                .insert(team.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_team(&self, name: &str) -> StateResult<Option<Team>> {
        self.get_json(TEAMS, name)
    }

    fn teams_named(&self, names: &[String]) -> StateResult<Vec<Team>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TEAMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for name in names {
            if let Some(guard) = table.get(name.as_str()).map_err(map_err!(Read))? {
                let team: Team =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                results.push(team);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app(name: &str, teams: &[&str]) -> App {
        let mut app = App::new(name, "python");
        app.teams = teams.iter().map(|t| t.to_string()).collect();
        app.units.push(Unit {
            instance_id: "i-0".to_string(),
            ip: "10.0.0.1".to_string(),
            agent_state: "started".to_string(),
            instance_state: "running".to_string(),
            machine: 1,
        });
        app
    }

    // ── App CRUD ───────────────────────────────────────────────────

    #[test]
    fn app_insert_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let app = test_app("blog", &["admin"]);

        store.insert_app(&app).unwrap();
        let retrieved = store.get_app("blog").unwrap();

        assert_eq!(retrieved, Some(app));
    }

    #[test]
    fn app_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_app("nothing").unwrap().is_none());
    }

    #[test]
    fn app_insert_duplicate_name_fails() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_app(&test_app("blog", &[])).unwrap();

        let err = store.insert_app(&test_app("blog", &["other"])).unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists(name) if name == "blog"));
        // Stored document untouched.
        assert!(store.get_app("blog").unwrap().unwrap().teams.is_empty());
    }

    #[test]
    fn app_find_by_predicate() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_app(&test_app("a", &["admin"])).unwrap();
        store.insert_app(&test_app("b", &["ops"])).unwrap();
        store.insert_app(&test_app("c", &["admin", "ops"])).unwrap();

        let admin = store.find_apps(&|app: &App| app.has_team("admin")).unwrap();
        let mut names: Vec<_> = admin.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(names, ["a", "c"]);
        assert_eq!(store.list_apps().unwrap().len(), 3);
    }

    #[test]
    fn app_remove() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_app(&test_app("blog", &[])).unwrap();

        assert!(store.remove_app("blog").unwrap());
        assert!(!store.remove_app("blog").unwrap());
        assert!(store.get_app("blog").unwrap().is_none());
    }

    // ── Versioned updates ──────────────────────────────────────────

    #[test]
    fn app_update_bumps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = test_app("blog", &[]);
        store.insert_app(&app).unwrap();

        app.append_log("hello");
        store.update_app(&mut app).unwrap();
        assert_eq!(app.version, 1);

        let stored = store.get_app("blog").unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.logs.len(), 1);
    }

    #[test]
    fn app_update_detects_concurrent_writer() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_app(&test_app("blog", &[])).unwrap();

        let mut first = store.get_app("blog").unwrap().unwrap();
        let mut second = store.get_app("blog").unwrap().unwrap();

        first.teams.push("admin".to_string());
        store.update_app(&mut first).unwrap();

        second.teams.push("ops".to_string());
        let err = store.update_app(&mut second).unwrap_err();
        assert!(matches!(
            err,
            StateError::Conflict { expected: 0, found: 1, .. }
        ));
        // The rejected write left the caller's version alone.
        assert_eq!(second.version, 0);
        assert_eq!(store.get_app("blog").unwrap().unwrap().teams, ["admin"]);
    }

    #[test]
    fn app_update_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let mut app = test_app("ghost", &[]);
        assert!(matches!(
            store.update_app(&mut app),
            Err(StateError::NotFound(_))
        ));
    }

    // ── Teams ──────────────────────────────────────────────────────

    #[test]
    fn teams_named_skips_unknown() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_team(&Team::new("admin", &["ana@example.com"])).unwrap();
        store.put_team(&Team::new("ops", &[])).unwrap();

        let teams = store
            .teams_named(&["admin".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "admin");
        assert!(store.get_team("ops").unwrap().is_some());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.insert_app(&test_app("blog", &["admin"])).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let app = store.get_app("blog").unwrap();
        assert_eq!(app.map(|a| a.teams), Some(vec!["admin".to_string()]));
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_apps().unwrap().is_empty());
        assert!(store.teams_named(&[]).unwrap().is_empty());
        assert!(!store.remove_app("nope").unwrap());
    }
}
