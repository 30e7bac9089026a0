//! redb table definitions for the Tideway state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// App aggregates keyed by app name.
pub const APPS: TableDefinition<&str, &[u8]> = TableDefinition::new("apps");

/// Teams keyed by team name.
pub const TEAMS: TableDefinition<&str, &[u8]> = TableDefinition::new("teams");
