//! List queries shared by every backend.

use std::cmp::Ordering;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::{CategoryId, Record};

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Insertion order as kept by the backend.
    #[default]
    StorageOrder,
    /// Category name or item title, compared after folding.
    Name,
    /// Item completion counter. Categories have none and compare equal.
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// What to fetch and how to order it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListQuery {
    /// Restricts items to one category. Ignored for categories.
    pub scope: Option<CategoryId>,
    /// Substring filter on the record label. Empty means no filter.
    pub text: Option<String>,
    pub sort: SortKey,
    pub direction: SortDirection,
}

impl ListQuery {
    /// All categories in storage order.
    pub fn categories() -> Self {
        Self::default()
    }

    /// Items of `scope`, most completed first.
    pub fn items(scope: CategoryId) -> Self {
        Self {
            scope: Some(scope),
            sort: SortKey::Count,
            direction: SortDirection::Descending,
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn sorted_by(mut self, sort: SortKey, direction: SortDirection) -> Self {
        self.sort = sort;
        self.direction = direction;
        self
    }

    /// The text filter, if it constrains anything.
    pub fn text_filter(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    pub fn matches(&self, record: &Record) -> bool {
        if let (Some(scope), Record::Item(item)) = (self.scope, record) {
            if item.category_id != scope {
                return false;
            }
        }
        match self.text_filter() {
            Some(text) => contains_folded(record.label(), text),
            None => true,
        }
    }

    /// Filters `records` and sorts them. The input order is treated as storage
    /// order, and ties keep it.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut records: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();
        let cmp: fn(&Record, &Record) -> Ordering = match self.sort {
            SortKey::StorageOrder => return self.storage_order(records),
            SortKey::Name => |a: &Record, b: &Record| fold(a.label()).cmp(&fold(b.label())),
            SortKey::Count => |a: &Record, b: &Record| count_of(a).cmp(&count_of(b)),
        };
        match self.direction {
            SortDirection::Ascending => records.sort_by(cmp),
            SortDirection::Descending => records.sort_by(|a, b| cmp(b, a)),
        }
        records
    }

    fn storage_order(&self, mut records: Vec<Record>) -> Vec<Record> {
        if self.direction == SortDirection::Descending {
            records.reverse();
        }
        records
    }
}

fn count_of(record: &Record) -> u32 {
    match record {
        Record::Item(item) => item.count,
        Record::Category(_) => 0,
    }
}

/// Lowercases `s` and strips diacritics, so "Café" folds to "cafe".
pub fn fold(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Case- and diacritic-insensitive substring test.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(&fold(needle))
}
