//! Item working set for a single category.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{
    Backend, Category, CategoryId, EntityKind, Item, ItemId, ListQuery, Record, StoreResult,
};

/// Items of the selected category, most completed first.
///
/// Nothing is listed or created until a scope is set with
/// [`ItemStore::set_scope`].
pub struct ItemStore<B: Backend> {
    backend: Arc<B>,
    scope: Option<CategoryId>,
    text: Option<String>,
    items: Vec<Item>,
}

impl<B: Backend> ItemStore<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            scope: None,
            text: None,
            items: Vec::new(),
        }
    }

    pub fn scope(&self) -> Option<CategoryId> {
        self.scope
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Selects `category` and reloads its items without a text filter.
    pub async fn set_scope(&mut self, category: &Category) -> StoreResult<&[Item]> {
        debug!(category_id = %category.id, "item scope changed");
        self.scope = Some(category.id);
        self.list(None).await
    }

    /// Reloads the scoped items, keeping titles containing `text` if it is
    /// non-empty.
    ///
    /// Returns nothing when no scope is set or the scoped category has been
    /// deleted.
    ///
    /// The filter is remembered for [`ItemStore::reload`] only once the read
    /// succeeds; on failure the working set and the filter stay as they were.
    pub async fn list(&mut self, text: Option<&str>) -> StoreResult<&[Item]> {
        let text = text.filter(|t| !t.is_empty()).map(str::to_string);
        self.load(text).await
    }

    /// Re-runs the last listing.
    pub async fn reload(&mut self) -> StoreResult<&[Item]> {
        self.load(self.text.clone()).await
    }

    pub async fn get(&self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self
            .backend
            .get(EntityKind::Item, id.as_uuid())
            .await?
            .and_then(Record::into_item))
    }

    /// Adds a pending item with the given title to the scoped category.
    ///
    /// Nothing is created when no scope is set or the scoped category has
    /// been deleted.
    pub async fn create(&mut self, title: &str) -> StoreResult<Option<Item>> {
        let Some(scope) = self.scope else {
            warn!("no category selected, item not created");
            return Ok(None);
        };
        if !self.scope_exists(scope).await? {
            warn!(category_id = %scope, "scoped category no longer exists, item not created");
            return Ok(None);
        }

        let item = Item::new(scope, title);
        self.items.push(item.clone());
        self.backend.insert(item.clone().into()).await?;
        self.save().await?;
        debug!(item_id = %item.id, category_id = %scope, "item created");
        Ok(Some(item))
    }

    /// Flips an item between pending and completed and persists it.
    ///
    /// The working set is not re-sorted; call [`ItemStore::reload`] for that.
    pub async fn toggle_done(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        item.toggle_done();
        let item = item.clone();

        self.backend.update(item.clone().into()).await?;
        self.save().await?;
        debug!(item_id = %id, done = item.done, count = item.count, "item toggled");
        Ok(Some(item))
    }

    /// Returns `false` if storage had no such item.
    pub async fn delete(&mut self, id: ItemId) -> StoreResult<bool> {
        let stored = self.get(id).await?.is_some();
        self.items.retain(|i| i.id != id);
        if !stored {
            return Ok(false);
        }

        self.backend.remove(EntityKind::Item, id.as_uuid()).await?;
        self.save().await?;
        Ok(true)
    }

    async fn scope_exists(&self, scope: CategoryId) -> StoreResult<bool> {
        let resolved = self
            .backend
            .get(EntityKind::Category, scope.as_uuid())
            .await
            .map_err(|e| {
                error!(error = %e, "failed to resolve item scope");
                e
            })?;
        Ok(resolved.is_some())
    }

    async fn load(&mut self, text: Option<String>) -> StoreResult<&[Item]> {
        let Some(scope) = self.scope else {
            self.text = text;
            self.items.clear();
            return Ok(&self.items);
        };

        if !self.scope_exists(scope).await? {
            debug!(category_id = %scope, "scoped category no longer exists");
            self.text = text;
            self.items.clear();
            return Ok(&self.items);
        }

        let mut query = ListQuery::items(scope);
        if let Some(text) = &text {
            query = query.with_text(text.clone());
        }
        let records = self
            .backend
            .fetch(EntityKind::Item, &query)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to load items");
                e
            })?;
        self.text = text;
        self.items = records.into_iter().filter_map(Record::into_item).collect();
        debug!(category_id = %scope, count = self.items.len(), "items loaded");
        Ok(&self.items)
    }

    async fn save(&self) -> StoreResult<()> {
        self.backend.save().await.map_err(|e| {
            error!(error = %e, "failed to save items");
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CategoryStore, MemoryBackend};

    fn titles(items: &[Item]) -> Vec<(&str, u32)> {
        items.iter().map(|i| (i.title.as_str(), i.count)).collect()
    }

    async fn setup(
        names: &[&str],
    ) -> (Arc<MemoryBackend>, Vec<Category>, ItemStore<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let mut categories = CategoryStore::new(backend.clone());
        let mut created = Vec::new();
        for name in names {
            created.push(categories.create(name).await.unwrap().unwrap());
        }
        (backend.clone(), created, ItemStore::new(backend))
    }

    #[tokio::test]
    async fn nothing_happens_without_scope() {
        let (backend, _, mut items) = setup(&[]).await;

        assert_eq!(items.create("Buy milk").await.unwrap(), None);
        assert!(items.list(None).await.unwrap().is_empty());
        assert_eq!(backend.len(EntityKind::Item).await, 0);
    }

    #[tokio::test]
    async fn created_items_belong_to_scope() {
        let (_, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();

        let item = items.create("").await.unwrap().unwrap();

        assert_eq!(item.category_id, categories[0].id);
        assert!(!item.done);
        assert_eq!(item.count, 0);
        assert_eq!(items.list(None).await.unwrap(), &[item]);
    }

    #[tokio::test]
    async fn completed_items_sort_first() {
        let (_, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Pay rent").await.unwrap();
        let milk = items.create("Buy milk").await.unwrap().unwrap();

        let toggled = items.toggle_done(milk.id).await.unwrap().unwrap();
        assert!(toggled.done);
        assert_eq!(toggled.count, 1);

        assert_eq!(
            titles(items.list(None).await.unwrap()),
            vec![("Buy milk", 1), ("Pay rent", 0)]
        );
    }

    #[tokio::test]
    async fn double_toggle_counts_once() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        let item = items.create("Water plants").await.unwrap().unwrap();

        items.toggle_done(item.id).await.unwrap();
        let item = items.toggle_done(item.id).await.unwrap().unwrap();

        assert!(!item.done);
        assert_eq!(item.count, 1);
        let stored = ItemStore::new(backend).get(item.id).await.unwrap().unwrap();
        assert_eq!(stored, item);
    }

    #[tokio::test]
    async fn toggling_unknown_item_is_none() {
        let (_, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        assert_eq!(items.toggle_done(ItemId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn text_filter_combines_with_scope() {
        let (_, categories, mut items) = setup(&["Home", "Work"]).await;
        items.set_scope(&categories[1]).await.unwrap();
        items.create("Email boss").await.unwrap();
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Clean kitchen").await.unwrap();
        let email = items.create("Reply to Émile's email").await.unwrap().unwrap();
        items.toggle_done(email.id).await.unwrap();

        assert_eq!(
            titles(items.list(Some("EMAIL")).await.unwrap()),
            vec![("Reply to Émile's email", 1)]
        );
        assert_eq!(
            titles(items.list(Some("emile")).await.unwrap()),
            vec![("Reply to Émile's email", 1)]
        );
        assert_eq!(items.list(Some("")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reload_keeps_last_filter() {
        let (_, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Buy milk").await.unwrap();
        items.create("Buy bread").await.unwrap();
        items.create("Pay rent").await.unwrap();

        items.list(Some("buy")).await.unwrap();
        assert_eq!(items.reload().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn same_named_categories_do_not_share_items() {
        let (_, categories, mut items) = setup(&["Home", "Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Buy milk").await.unwrap();

        assert!(items.set_scope(&categories[1]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_scope_lists_nothing() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Buy milk").await.unwrap();

        let mut store = CategoryStore::new(backend.clone());
        store.delete(categories[0].id).await.unwrap();

        assert!(items.reload().await.unwrap().is_empty());
        assert_eq!(backend.len(EntityKind::Item).await, 1);
    }

    #[tokio::test]
    async fn deleted_scope_refuses_new_items() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();

        let mut store = CategoryStore::new(backend.clone());
        store.delete(categories[0].id).await.unwrap();

        assert_eq!(items.create("Ghost").await.unwrap(), None);
        assert!(items.items().is_empty());
        assert_eq!(backend.len(EntityKind::Item).await, 0);
    }

    #[tokio::test]
    async fn read_failure_keeps_stale_items_and_filter() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        items.create("Buy milk").await.unwrap();
        items.create("Pay rent").await.unwrap();
        items.list(Some("milk")).await.unwrap();

        backend.set_fail_reads(true);
        assert!(items.list(Some("rent")).await.is_err());
        assert_eq!(titles(items.items()), vec![("Buy milk", 0)]);

        backend.set_fail_reads(false);
        assert_eq!(titles(items.reload().await.unwrap()), vec![("Buy milk", 0)]);
    }

    #[tokio::test]
    async fn delete_removes_from_working_set_and_storage() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        let item = items.create("Buy milk").await.unwrap().unwrap();

        assert!(items.delete(item.id).await.unwrap());
        assert!(items.items().is_empty());
        assert_eq!(backend.len(EntityKind::Item).await, 0);
        assert!(!items.delete(item.id).await.unwrap());
    }

    #[tokio::test]
    async fn failed_toggle_save_diverges_until_reload() {
        let (backend, categories, mut items) = setup(&["Home"]).await;
        items.set_scope(&categories[0]).await.unwrap();
        let item = items.create("Buy milk").await.unwrap().unwrap();

        backend.fail_next_save();
        assert!(items.toggle_done(item.id).await.is_err());
        assert!(items.items()[0].done);

        let reloaded = items.reload().await.unwrap();
        assert!(!reloaded[0].done);
        assert_eq!(reloaded[0].count, 0);
    }
}
