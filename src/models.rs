//! Category and item records.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parses the hyphenated form stored in the database.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

record_id!(
    /// Identifier of a [`Category`].
    CategoryId
);
record_id!(
    /// Identifier of an [`Item`].
    ItemId
);

/// A named grouping of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

impl Category {
    /// Creates a category with a fresh id.
    ///
    /// No validation happens here; [`CategoryStore::create`](crate::CategoryStore::create)
    /// is where blank names are rejected.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(),
            name: name.into(),
        }
    }
}

/// Completion state of an [`Item`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Completed,
}

/// A single to-do entry belonging to exactly one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub done: bool,
    /// Number of times the item went from pending to completed.
    pub count: u32,
    pub category_id: CategoryId,
}

impl Item {
    /// Creates a pending item with a zero counter under `category_id`.
    pub fn new(category_id: CategoryId, title: impl Into<String>) -> Self {
        Self {
            id: ItemId::new(),
            title: title.into(),
            done: false,
            count: 0,
            category_id,
        }
    }

    pub fn state(&self) -> ItemState {
        if self.done {
            ItemState::Completed
        } else {
            ItemState::Pending
        }
    }

    /// Flips the done flag. Completing bumps `count`; reopening leaves it alone.
    pub fn toggle_done(&mut self) -> ItemState {
        match self.state() {
            ItemState::Pending => {
                self.done = true;
                self.count = self.count.saturating_add(1);
            }
            ItemState::Completed => self.done = false,
        }
        self.state()
    }
}

/// The kinds of record a backend persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Category,
    Item,
}

impl EntityKind {
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Category => "categories",
            EntityKind::Item => "items",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Category => f.write_str("category"),
            EntityKind::Item => f.write_str("item"),
        }
    }
}

/// A record as exchanged with a [`Backend`](crate::Backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Category(Category),
    Item(Item),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Category(_) => EntityKind::Category,
            Record::Item(_) => EntityKind::Item,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Record::Category(c) => c.id.as_uuid(),
            Record::Item(i) => i.id.as_uuid(),
        }
    }

    /// The text searched by a text filter: category name or item title.
    pub fn label(&self) -> &str {
        match self {
            Record::Category(c) => &c.name,
            Record::Item(i) => &i.title,
        }
    }

    pub fn into_category(self) -> Option<Category> {
        match self {
            Record::Category(c) => Some(c),
            Record::Item(_) => None,
        }
    }

    pub fn into_item(self) -> Option<Item> {
        match self {
            Record::Item(i) => Some(i),
            Record::Category(_) => None,
        }
    }
}

impl From<Category> for Record {
    fn from(category: Category) -> Self {
        Record::Category(category)
    }
}

impl From<Item> for Record {
    fn from(item: Item) -> Self {
        Record::Item(item)
    }
}
