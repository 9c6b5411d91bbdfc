//! Store configuration.

use serde::Deserialize;

use crate::sqlite::{todo_schema, SqliteBackend, SqliteConfig};
use crate::{StorageError, StoreResult};

/// What happens to a category's items when the category is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Leave the items in storage. They are no longer listed anywhere.
    #[default]
    Orphan,
    /// Delete the items in the same save as the category.
    Cascade,
    /// Refuse to delete a category that still owns items.
    Restrict,
}

/// Top-level configuration, usually read from a TOML file.
///
/// ```toml
/// db_path = "todoshka.sqlite"
/// delete_policy = "cascade"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Database file. Omit for an in-memory database.
    pub db_path: Option<String>,
    pub delete_policy: DeletePolicy,
}

impl StoreConfig {
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        toml::from_str(s).map_err(|e| StorageError::Config(e.to_string()))
    }

    pub fn sqlite_config(&self) -> SqliteConfig {
        match &self.db_path {
            Some(path) => SqliteConfig::new(path.clone(), todo_schema()),
            None => SqliteConfig::in_memory(todo_schema()),
        }
    }

    pub fn open_backend(&self) -> StoreResult<SqliteBackend> {
        SqliteBackend::open(&self.sqlite_config())
    }
}
