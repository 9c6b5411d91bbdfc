//! In-memory backend for testing.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::lock::Mutex;
use uuid::Uuid;

use crate::backend::Change;
use crate::{Backend, EntityKind, ListQuery, Record, StorageError, StoreResult};

#[derive(Debug, Default)]
struct State {
    /// Committed records in insertion order.
    records: Vec<Record>,
    staged: Vec<Change>,
}

/// Backend that keeps everything in process memory.
///
/// Reads and saves can be made to fail on demand to exercise the stores'
/// error paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
    fail_reads: AtomicBool,
    fail_next_save: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every fetch and get fail until turned off again.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes the next save fail and drop its staged changes.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Number of committed records of `kind`.
    pub async fn len(&self, kind: EntityKind) -> usize {
        let state = self.state.lock().await;
        state.records.iter().filter(|r| r.kind() == kind).count()
    }

    fn check_reads(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch(&self, kind: EntityKind, query: &ListQuery) -> StoreResult<Vec<Record>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        let records = state
            .records
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect();
        Ok(query.apply(records))
    }

    async fn get(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<Record>> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .records
            .iter()
            .find(|r| r.kind() == kind && r.id() == id)
            .cloned())
    }

    async fn insert(&self, record: Record) -> StoreResult<()> {
        self.state.lock().await.staged.push(Change::Insert(record));
        Ok(())
    }

    async fn update(&self, record: Record) -> StoreResult<()> {
        self.state.lock().await.staged.push(Change::Update(record));
        Ok(())
    }

    async fn remove(&self, kind: EntityKind, id: Uuid) -> StoreResult<()> {
        self.state.lock().await.staged.push(Change::Remove(kind, id));
        Ok(())
    }

    async fn save(&self) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let staged = std::mem::take(&mut state.staged);
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Unavailable("save rejected".to_string()));
        }

        // Apply to a copy so a bad change leaves the committed set untouched.
        let mut records = state.records.clone();
        for change in staged {
            match change {
                Change::Insert(record) => {
                    if records.iter().any(|r| r.kind() == record.kind() && r.id() == record.id()) {
                        return Err(StorageError::Unavailable(format!(
                            "duplicate {} {}",
                            record.kind(),
                            record.id()
                        )));
                    }
                    records.push(record);
                }
                Change::Update(record) => {
                    if let Some(existing) = records
                        .iter_mut()
                        .find(|r| r.kind() == record.kind() && r.id() == record.id())
                    {
                        *existing = record;
                    }
                }
                Change::Remove(kind, id) => records.retain(|r| !(r.kind() == kind && r.id() == id)),
            }
        }
        state.records = records;
        Ok(())
    }
}
