//! Routing table mapping app names to their backend endpoints.
//!
//! Each app name owns a set of backend addresses (typically unit IPs).
//! The table is independent of the persisted App aggregate: it is the
//! system of record for live traffic, kept in step by whoever changes
//! unit topology.
//!
//! All operations take the table lock for their full duration, so each one
//! is atomic and operations on one name are linearizable. An entry is never
//! left with an empty endpoint set: removing the last endpoint removes the
//! route.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

/// The routing surface consumed by scaling workflows.
pub trait Router: Send + Sync {
    /// Register `address` as a backend of `name`.
    fn add_route(&self, name: &str, address: &str);

    /// Drop every backend of `name`. Returns true if a route existed.
    fn remove_route(&self, name: &str) -> bool;

    fn has_route(&self, name: &str) -> bool;
}

/// Concurrency-safe app name → endpoint set mapping.
///
/// Cloning is cheap and yields a handle to the same table.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Every mutation is a single map call, so a poisoned lock still guards
    // a consistent map.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.routes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, BTreeSet<String>>> {
        self.routes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove a single backend. Returns true if it was registered.
    pub fn remove_endpoint(&self, name: &str, address: &str) -> bool {
        let mut routes = self.write();
        let Some(endpoints) = routes.get_mut(name) else {
            return false;
        };
        let removed = endpoints.remove(address);
        if endpoints.is_empty() {
            routes.remove(name);
        }
        debug!(app = name, address, removed, "route endpoint removed");
        removed
    }

    /// Replace all backends of `name` at once. An empty set removes the route.
    pub fn replace_routes<I>(&self, name: &str, addresses: I)
    where
        I: IntoIterator<Item = String>,
    {
        let endpoints: BTreeSet<String> = addresses.into_iter().collect();
        let mut routes = self.write();
        debug!(app = name, count = endpoints.len(), "routes replaced");
        if endpoints.is_empty() {
            routes.remove(name);
        } else {
            routes.insert(name.to_string(), endpoints);
        }
    }

    /// Backends of `name`, sorted.
    pub fn routes(&self, name: &str) -> Vec<String> {
        self.read()
            .get(name)
            .map(|endpoints| endpoints.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names with at least one backend.
    pub fn app_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Router for RoutingTable {
    fn add_route(&self, name: &str, address: &str) {
        let mut routes = self.write();
        routes
            .entry(name.to_string())
            .or_default()
            .insert(address.to_string());
        debug!(app = name, address, "route added");
    }

    fn remove_route(&self, name: &str) -> bool {
        let removed = self.write().remove(name).is_some();
        debug!(app = name, removed, "route removed");
        removed
    }

    fn has_route(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }
}
