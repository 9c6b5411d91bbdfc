//! SQLite backend.

use async_trait::async_trait;
use futures::lock::Mutex;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::backend::Change;
use crate::{
    Backend, Category, CategoryId, EntityKind, Item, ItemId, ListQuery, Record, StorageError,
    StoreResult,
};

/// Equality conditions on text columns, joined with AND in insertion order
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Query {
    pub conditions: Vec<(String, String)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_equal(mut self, field: &str, value: impl Into<String>) -> Self {
        self.conditions.push((field.to_string(), value.into()));
        self
    }

    /// Renders ` WHERE ...` (empty when unconditioned) with positional parameters.
    pub fn to_where_clause(&self) -> (String, Vec<&str>) {
        if self.conditions.is_empty() {
            return (String::new(), Vec::new());
        }
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .enumerate()
            .map(|(i, (field, _))| format!("{field} = ?{}", i + 1))
            .collect();
        let values = self.conditions.iter().map(|(_, v)| v.as_str()).collect();
        (format!(" WHERE {}", clauses.join(" AND ")), values)
    }
}

/// Schema definition for the SQLite database
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add_table(mut self, table: TableDefinition) -> Self {
        self.tables.push(table);
        self
    }

    /// DDL for every table and index, idempotent.
    pub fn to_sql(&self) -> String {
        self.tables
            .iter()
            .map(TableDefinition::to_sql)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn to_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(ColumnDefinition::to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("CREATE TABLE IF NOT EXISTS {} ({});", self.name, columns);
        for index in &self.indexes {
            sql.push_str(&format!(
                "\nCREATE {}INDEX IF NOT EXISTS {} ON {}({});",
                if index.unique { "UNIQUE " } else { "" },
                index.name,
                self.name,
                index.columns.join(", ")
            ));
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: DataType,
    pub constraints: Vec<ColumnConstraint>,
    pub default_value: Option<i64>,
}

impl ColumnDefinition {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            constraints: Vec::new(),
            default_value: None,
        }
    }

    pub fn constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn default_value(mut self, value: i64) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.data_type.as_sql());
        for constraint in &self.constraints {
            sql.push(' ');
            sql.push_str(constraint.as_sql());
        }
        if let Some(default) = self.default_value {
            sql.push_str(&format!(" DEFAULT {default}"));
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DataType {
    Integer,
    Text,
}

impl DataType {
    fn as_sql(&self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnConstraint {
    PrimaryKey,
    AutoIncrement,
    NotNull,
    Unique,
}

impl ColumnConstraint {
    fn as_sql(&self) -> &'static str {
        match self {
            ColumnConstraint::PrimaryKey => "PRIMARY KEY",
            ColumnConstraint::AutoIncrement => "AUTOINCREMENT",
            ColumnConstraint::NotNull => "NOT NULL",
            ColumnConstraint::Unique => "UNIQUE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Tables for categories and items.
///
/// `seq` fixes storage order. `items.category_id` carries no foreign key so
/// that items can outlive their category.
pub fn todo_schema() -> Schema {
    let seq = || {
        ColumnDefinition::new("seq", DataType::Integer)
            .constraint(ColumnConstraint::PrimaryKey)
            .constraint(ColumnConstraint::AutoIncrement)
    };
    let id = || {
        ColumnDefinition::new("id", DataType::Text)
            .constraint(ColumnConstraint::NotNull)
            .constraint(ColumnConstraint::Unique)
    };
    let text = |name: &str| {
        ColumnDefinition::new(name, DataType::Text).constraint(ColumnConstraint::NotNull)
    };

    Schema::new()
        .add_table(
            TableDefinition::new(EntityKind::Category.table())
                .column(seq())
                .column(id())
                .column(text("name")),
        )
        .add_table(
            TableDefinition::new(EntityKind::Item.table())
                .column(seq())
                .column(id())
                .column(text("title"))
                .column(
                    ColumnDefinition::new("done", DataType::Integer)
                        .constraint(ColumnConstraint::NotNull)
                        .default_value(0),
                )
                .column(
                    ColumnDefinition::new("count", DataType::Integer)
                        .constraint(ColumnConstraint::NotNull)
                        .default_value(0),
                )
                .column(text("category_id"))
                .index(IndexDefinition {
                    name: "idx_items_category_id".to_string(),
                    columns: vec!["category_id".to_string()],
                    unique: false,
                }),
        )
}

/// SQLite backend configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteConfig {
    /// Path to the SQLite database file; `None` opens an in-memory database
    pub db_path: Option<String>,
    /// Schema definition for the database
    pub schema: Schema,
}

impl SqliteConfig {
    /// Create a new SQLite config with path and schema
    pub fn new(db_path: impl Into<String>, schema: Schema) -> Self {
        Self {
            db_path: Some(db_path.into()),
            schema,
        }
    }

    pub fn in_memory(schema: Schema) -> Self {
        Self {
            db_path: None,
            schema,
        }
    }
}

struct State {
    conn: Connection,
    staged: Vec<Change>,
}

/// [`Backend`] persisting to a SQLite database.
pub struct SqliteBackend {
    state: Mutex<State>,
}

impl SqliteBackend {
    /// Opens the database described by `config` and creates missing tables.
    pub fn open(config: &SqliteConfig) -> StoreResult<Self> {
        let conn = match &config.db_path {
            Some(path) => {
                info!(path = %path, "opening sqlite database");
                Connection::open(path)?
            }
            None => {
                info!("opening in-memory sqlite database");
                Connection::open_in_memory()?
            }
        };
        Self::initialize_schema(&conn, &config.schema)?;
        Ok(Self {
            state: Mutex::new(State {
                conn,
                staged: Vec::new(),
            }),
        })
    }

    /// In-memory database with the default schema.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(&SqliteConfig::in_memory(todo_schema()))
    }

    fn initialize_schema(conn: &Connection, schema: &Schema) -> StoreResult<()> {
        conn.execute_batch(&schema.to_sql())?;
        info!(tables = schema.tables.len(), "sqlite schema initialized");
        Ok(())
    }

    fn select(conn: &Connection, kind: EntityKind, query: &Query) -> StoreResult<Vec<Record>> {
        let columns = match kind {
            EntityKind::Category => "id, name",
            EntityKind::Item => "id, title, done, count, category_id",
        };
        let (where_clause, values) = query.to_where_clause();
        let sql = format!(
            "SELECT {columns} FROM {}{where_clause} ORDER BY seq",
            kind.table()
        );
        debug!(%sql, "sqlite select");

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(match kind {
                EntityKind::Category => Record::Category(category_from_row(row)?),
                EntityKind::Item => Record::Item(item_from_row(row)?),
            });
        }
        Ok(records)
    }

    fn apply(conn: &Connection, change: &Change) -> StoreResult<()> {
        match change {
            Change::Insert(Record::Category(c)) => {
                conn.execute(
                    "INSERT INTO categories (id, name) VALUES (?1, ?2)",
                    params![c.id.to_string(), c.name],
                )?;
            }
            Change::Insert(Record::Item(i)) => {
                conn.execute(
                    "INSERT INTO items (id, title, done, count, category_id) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        i.id.to_string(),
                        i.title,
                        i.done,
                        i.count,
                        i.category_id.to_string()
                    ],
                )?;
            }
            Change::Update(Record::Category(c)) => {
                conn.execute(
                    "UPDATE categories SET name = ?2 WHERE id = ?1",
                    params![c.id.to_string(), c.name],
                )?;
            }
            Change::Update(Record::Item(i)) => {
                conn.execute(
                    "UPDATE items SET title = ?2, done = ?3, count = ?4, category_id = ?5 \
                     WHERE id = ?1",
                    params![
                        i.id.to_string(),
                        i.title,
                        i.done,
                        i.count,
                        i.category_id.to_string()
                    ],
                )?;
            }
            Change::Remove(kind, id) => {
                conn.execute(
                    &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
                    params![id.to_string()],
                )?;
            }
        }
        Ok(())
    }
}

fn category_from_row(row: &Row<'_>) -> StoreResult<Category> {
    let id: String = row.get(0)?;
    Ok(Category {
        id: CategoryId::parse(&id).map_err(|_| StorageError::corrupt("categories", "id", id))?,
        name: row.get(1)?,
    })
}

fn item_from_row(row: &Row<'_>) -> StoreResult<Item> {
    let id: String = row.get(0)?;
    let count: i64 = row.get(3)?;
    let category_id: String = row.get(4)?;
    Ok(Item {
        id: ItemId::parse(&id).map_err(|_| StorageError::corrupt("items", "id", id))?,
        title: row.get(1)?,
        done: row.get(2)?,
        count: u32::try_from(count)
            .map_err(|_| StorageError::corrupt("items", "count", count.to_string()))?,
        category_id: CategoryId::parse(&category_id)
            .map_err(|_| StorageError::corrupt("items", "category_id", category_id))?,
    })
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn fetch(&self, kind: EntityKind, query: &ListQuery) -> StoreResult<Vec<Record>> {
        let mut sql_query = Query::new();
        if let (EntityKind::Item, Some(scope)) = (kind, query.scope) {
            sql_query = sql_query.with_equal("category_id", scope.to_string());
        }
        let state = self.state.lock().await;
        let records = Self::select(&state.conn, kind, &sql_query)?;
        Ok(query.apply(records))
    }

    async fn get(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<Record>> {
        let query = Query::new().with_equal("id", id.to_string());
        let state = self.state.lock().await;
        Ok(Self::select(&state.conn, kind, &query)?.into_iter().next())
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
        if staged.is_empty() {
            return Ok(());
        }
        let count = staged.len();

        let tx = state.conn.transaction()?;
        for change in &staged {
            if let Err(e) = Self::apply(&tx, change) {
                error!(error = %e, "sqlite save failed, rolling back");
                return Err(e);
            }
        }
        tx.commit()?;
        debug!(changes = count, "sqlite save committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_renders_positional_conditions() {
        let query = Query::new()
            .with_equal("category_id", "abc")
            .with_equal("id", "def");

        let (sql, values) = query.to_where_clause();

        assert_eq!(sql, " WHERE category_id = ?1 AND id = ?2");
        assert_eq!(values, vec!["abc", "def"]);
    }

    #[test]
    fn empty_query_has_no_where_clause() {
        assert_eq!(Query::new().to_where_clause(), (String::new(), Vec::new()));
    }

    #[test]
    fn column_ddl_includes_constraints_and_default() {
        let column = ColumnDefinition::new("count", DataType::Integer)
            .constraint(ColumnConstraint::NotNull)
            .default_value(0);
        assert_eq!(column.to_sql(), "count INTEGER NOT NULL DEFAULT 0");

        let seq = ColumnDefinition::new("seq", DataType::Integer)
            .constraint(ColumnConstraint::PrimaryKey)
            .constraint(ColumnConstraint::AutoIncrement);
        assert_eq!(seq.to_sql(), "seq INTEGER PRIMARY KEY AUTOINCREMENT");
    }

    #[test]
    fn todo_schema_creates_both_tables() {
        let sql = todo_schema().to_sql();
        assert!(sql.contains(concat!(
            "CREATE TABLE IF NOT EXISTS categories (",
            "seq INTEGER PRIMARY KEY AUTOINCREMENT, id TEXT NOT NULL UNIQUE, name TEXT NOT NULL);"
        )));
        assert!(sql.contains(
            "CREATE INDEX IF NOT EXISTS idx_items_category_id ON items(category_id);"
        ));

        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&sql).unwrap();
        // Idempotent.
        conn.execute_batch(&sql).unwrap();
    }

    #[tokio::test]
    async fn corrupt_ids_are_reported() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        {
            let state = backend.state.lock().await;
            state
                .conn
                .execute("INSERT INTO categories (id, name) VALUES ('bogus', 'Home')", [])
                .unwrap();
        }

        let err = backend
            .fetch(EntityKind::Category, &ListQuery::categories())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { column: "id", .. }));
    }

    #[tokio::test]
    async fn failed_save_rolls_back_the_whole_batch() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let category = Category::new("Home");
        backend.insert(category.clone().into()).await.unwrap();
        backend.insert(Category::new("Work").into()).await.unwrap();
        // Same id twice violates the UNIQUE constraint.
        backend.insert(category.into()).await.unwrap();

        assert!(matches!(backend.save().await, Err(StorageError::Sqlite(_))));
        let categories = backend
            .fetch(EntityKind::Category, &ListQuery::categories())
            .await
            .unwrap();
        assert!(categories.is_empty());
    }
}
