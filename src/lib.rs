//! Category and to-do item persistence for Todoshka.
//!
//! # Intention
//!
//! - Keep the categories and items a to-do list shows, filtered and sorted
//!   the same way regardless of where they are stored.
//! - Encapsulate SQLite-specific logic, types, and error handling behind the
//!   [`Backend`] trait.
//!
//! # Architectural Boundaries
//!
//! - Only data access belongs here: no rendering, dialogs, or app lifecycle.
//! - Stores receive their backend explicitly; there is no global handle.
//!
//! ```no_run
//! # async fn demo() -> todoshka_store::StoreResult<()> {
//! use std::sync::Arc;
//! use todoshka_store::{CategoryStore, ItemStore, StoreConfig};
//!
//! let backend = Arc::new(StoreConfig::default().open_backend()?);
//! let mut categories = CategoryStore::new(backend.clone());
//! let mut items = ItemStore::new(backend);
//!
//! if let Some(home) = categories.create("Home").await? {
//!     items.set_scope(&home).await?;
//!     items.create("Buy milk").await?;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod category_store;
mod config;
mod error;
mod item_store;
mod memory;
mod models;
pub mod query;
pub mod sqlite;

pub use backend::Backend;
pub use category_store::CategoryStore;
pub use config::{DeletePolicy, StoreConfig};
pub use error::{StorageError, StoreResult};
pub use item_store::ItemStore;
pub use memory::MemoryBackend;
pub use models::{Category, CategoryId, EntityKind, Item, ItemId, ItemState, Record};
pub use query::{ListQuery, SortDirection, SortKey};
pub use sqlite::{SqliteBackend, SqliteConfig};
