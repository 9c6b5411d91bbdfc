//! Category working set.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::query::{SortDirection, SortKey};
use crate::{
    Backend, Category, CategoryId, DeletePolicy, EntityKind, ListQuery, Record, StorageError,
    StoreResult,
};

/// Keeps the categories currently shown and writes changes through to a [`Backend`].
pub struct CategoryStore<B: Backend> {
    backend: Arc<B>,
    delete_policy: DeletePolicy,
    categories: Vec<Category>,
    last_query: ListQuery,
}

impl<B: Backend> CategoryStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            delete_policy: DeletePolicy::default(),
            categories: Vec::new(),
            last_query: ListQuery::categories(),
        }
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    /// The working set as of the last list or mutation.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Replaces the working set with categories from storage.
    ///
    /// A non-empty `filter` keeps names containing it (ignoring case and
    /// accents) and implies sorting by name. Otherwise storage order is kept
    /// unless `sort_by_name` is set. On failure the working set is left as it
    /// was.
    pub async fn list(
        &mut self,
        filter: Option<&str>,
        sort_by_name: bool,
    ) -> StoreResult<&[Category]> {
        let mut query = ListQuery::categories();
        match filter.filter(|f| !f.is_empty()) {
            Some(text) => {
                query = query
                    .with_text(text)
                    .sorted_by(SortKey::Name, SortDirection::Ascending);
            }
            None if sort_by_name => {
                query = query.sorted_by(SortKey::Name, SortDirection::Ascending);
            }
            None => {}
        }
        self.load(query).await
    }

    /// Re-runs the last list query.
    pub async fn reload(&mut self) -> StoreResult<&[Category]> {
        self.load(self.last_query.clone()).await
    }

    pub async fn get(&self, id: CategoryId) -> StoreResult<Option<Category>> {
        Ok(self
            .backend
            .get(EntityKind::Category, id.as_uuid())
            .await?
            .and_then(Record::into_category))
    }

    /// Creates a category, or does nothing if `name` is blank.
    ///
    /// The name is stored as given; trimming only decides whether it is blank.
    pub async fn create(&mut self, name: &str) -> StoreResult<Option<Category>> {
        if name.trim().is_empty() {
            debug!("ignoring blank category name");
            return Ok(None);
        }

        let category = Category::new(name);
        self.categories.push(category.clone());
        self.backend.insert(category.clone().into()).await?;
        self.save().await?;
        debug!(category_id = %category.id, "category created");
        Ok(Some(category))
    }

    /// Renames a stored category. Blank names and unknown ids are ignored.
    pub async fn rename(&mut self, id: CategoryId, name: &str) -> StoreResult<Option<Category>> {
        if name.trim().is_empty() {
            debug!(category_id = %id, "ignoring blank category name");
            return Ok(None);
        }
        let Some(mut category) = self.get(id).await? else {
            return Ok(None);
        };

        category.name = name.to_string();
        if let Some(current) = self.categories.iter_mut().find(|c| c.id == id) {
            current.name = category.name.clone();
        }
        self.backend.update(category.clone().into()).await?;
        self.save().await?;
        Ok(Some(category))
    }

    /// Deletes a category, handling its items per the delete policy.
    ///
    /// Returns `false` if storage had no such category.
    pub async fn delete(&mut self, id: CategoryId) -> StoreResult<bool> {
        if self.get(id).await?.is_none() {
            self.categories.retain(|c| c.id != id);
            return Ok(false);
        }

        if self.delete_policy != DeletePolicy::Orphan {
            let items = self
                .backend
                .fetch(EntityKind::Item, &ListQuery::items(id))
                .await?;
            match self.delete_policy {
                DeletePolicy::Restrict if !items.is_empty() => {
                    warn!(
                        category_id = %id,
                        items = items.len(),
                        "refusing to delete category with items"
                    );
                    return Err(StorageError::CategoryInUse {
                        id,
                        items: items.len(),
                    });
                }
                DeletePolicy::Cascade => {
                    for item in &items {
                        self.backend.remove(EntityKind::Item, item.id()).await?;
                    }
                    debug!(category_id = %id, items = items.len(), "cascading category delete");
                }
                _ => {}
            }
        }

        self.categories.retain(|c| c.id != id);
        self.backend.remove(EntityKind::Category, id.as_uuid()).await?;
        self.save().await?;
        Ok(true)
    }

    async fn load(&mut self, query: ListQuery) -> StoreResult<&[Category]> {
        match self.backend.fetch(EntityKind::Category, &query).await {
            Ok(records) => {
                self.categories = records.into_iter().filter_map(Record::into_category).collect();
                self.last_query = query;
                debug!(count = self.categories.len(), "categories loaded");
                Ok(&self.categories)
            }
            Err(e) => {
                error!(error = %e, "failed to load categories");
                Err(e)
            }
        }
    }

    async fn save(&self) -> StoreResult<()> {
        self.backend.save().await.map_err(|e| {
            error!(error = %e, "failed to save categories");
            e
        })
    }
}
