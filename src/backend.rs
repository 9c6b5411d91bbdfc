//! Persistence contract the stores are built on.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{EntityKind, ListQuery, Record, StoreResult};

/// Durable storage for categories and items.
///
/// Writes are staged and only become durable on [`Backend::save`], which
/// applies everything staged since the last save or none of it.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetches committed records of `kind` matching `query`, in query order.
    async fn fetch(&self, kind: EntityKind, query: &ListQuery) -> StoreResult<Vec<Record>>;

    /// Looks up one committed record by id.
    async fn get(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<Record>>;

    /// Stages a new record.
    async fn insert(&self, record: Record) -> StoreResult<()>;

    /// Stages a replacement for an existing record with the same id.
    async fn update(&self, record: Record) -> StoreResult<()>;

    /// Stages removal of a record.
    async fn remove(&self, kind: EntityKind, id: Uuid) -> StoreResult<()>;

    /// Commits staged changes. Staged changes are dropped on failure.
    async fn save(&self) -> StoreResult<()>;
}

/// A staged write, applied in order on save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Change {
    Insert(Record),
    Update(Record),
    Remove(EntityKind, Uuid),
}
