//! Schema definitions and management
//!
//! Entities describe their own table through the [`Entity`] trait. A [`Model`] is the
//! set of entity schemas a session exposes, and [`SchemaManager`] materializes that
//! model on a connection.

use crate::error::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use tracing::{info, warn};

/// Storage class of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Blob,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// A non-key column of an entity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub max_length: Option<usize>,
    pub nullable: bool,
}

impl Column {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            max_length: None,
            nullable: false,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub const fn real(name: &'static str) -> Self {
        Self::new(name, ColumnType::Real)
    }

    pub const fn text(name: &'static str) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub const fn blob(name: &'static str) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    /// Limit the length of stored values; enforced with a `CHECK` constraint
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    fn definition(&self) -> String {
        let name = quote_ident(self.name);
        let mut def = format!("{} {}", name, self.column_type.sql());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(max) = self.max_length {
            def.push_str(&format!(" CHECK (length({}) <= {})", name, max));
        }
        def
    }
}

/// A record type stored in its own table
///
/// Every entity has an integer key column (`id` unless overridden) declared as
/// `INTEGER PRIMARY KEY AUTOINCREMENT`, so inserted rows receive sequential keys
/// starting at 1. `columns()`, `to_values()` and `from_row()` must agree on column
/// order; `from_row()` receives the key first, followed by the columns.
pub trait Entity: Sized + 'static {
    /// Table name
    const TABLE: &'static str;

    /// Key column name
    const KEY: &'static str = "id";

    /// Non-key columns, in storage order
    fn columns() -> Vec<Column>;

    /// The key, or `None` if the entity has not been stored yet
    fn key(&self) -> Option<i64>;

    /// Values for `columns()`, in the same order
    fn to_values(&self) -> Vec<Value>;

    /// Build an entity from a `key, columns...` row
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Table layout of one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    pub table: &'static str,
    pub key: &'static str,
    pub columns: Vec<Column>,
}

impl EntitySchema {
    /// Describe the table of `E`
    pub fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            key: E::KEY,
            columns: E::columns(),
        }
    }

    /// `CREATE TABLE` statement for this entity
    pub fn create_table_sql(&self) -> String {
        let mut defs = vec![format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
            quote_ident(self.key)
        )];
        defs.extend(self.columns.iter().map(Column::definition));
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_ident(self.table),
            defs.join(",\n    ")
        )
    }

    /// Quoted `key, columns...` list used by every `SELECT`
    pub(crate) fn select_list(&self) -> String {
        std::iter::once(self.key)
            .chain(self.columns.iter().map(|c| c.name))
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Whether `name` is the key or one of the columns
    pub fn has_column(&self, name: &str) -> bool {
        name == self.key || self.columns.iter().any(|c| c.name == name)
    }
}

/// The set of entity schemas a session exposes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    entities: Vec<EntitySchema>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn entities(&self) -> &[EntitySchema] {
        &self.entities
    }

    /// Schema of the entity stored in `table`
    pub fn schema(&self, table: &str) -> Option<&EntitySchema> {
        self.entities.iter().find(|e| e.table == table)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects entity registrations into a [`Model`]
#[derive(Debug, Default)]
pub struct ModelBuilder {
    entities: Vec<EntitySchema>,
}

impl ModelBuilder {
    /// Register `E`; registering the same table twice keeps the first registration
    pub fn entity<E: Entity>(&mut self) -> &mut Self {
        if self.entities.iter().any(|e| e.table == E::TABLE) {
            warn!("Entity table `{}` registered more than once", E::TABLE);
        } else {
            self.entities.push(EntitySchema::of::<E>());
        }
        self
    }

    pub fn build(self) -> Model {
        Model {
            entities: self.entities,
        }
    }
}

/// Status of a model's schema on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaStatus {
    /// None of the model's tables exist
    NotCreated,

    /// Every table of the model exists
    Created,

    /// Some tables exist, these are missing
    Partial { missing: Vec<String> },
}

/// Schema manager for a model on one connection
///
/// Handles schema creation, deletion and status checks.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
    model: &'a Model,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection, model: &'a Model) -> Self {
        Self { conn, model }
    }

    /// Create the schema of the model on an empty database
    ///
    /// Returns `true` after creating every table. Returns `false` without touching
    /// anything if the database already holds user tables.
    pub fn ensure_created(&self) -> Result<bool> {
        if !self.user_tables()?.is_empty() {
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;
        for entity in self.model.entities() {
            let sql = entity.create_table_sql();
            tracing::trace!("{}", sql);
            tx.execute(&sql, [])?;
        }
        tx.commit()?;

        info!(
            "Created schema with {} table(s)",
            self.model.entities().len()
        );
        Ok(true)
    }

    /// Drop every table of the model
    ///
    /// Returns `true` if at least one table was dropped.
    pub fn ensure_deleted(&self) -> Result<bool> {
        let mut dropped = false;
        let tx = self.conn.unchecked_transaction()?;
        for entity in self.model.entities().iter().rev() {
            if table_exists(&tx, entity.table)? {
                tx.execute(&format!("DROP TABLE {}", quote_ident(entity.table)), [])?;
                dropped = true;
            }
        }
        tx.commit()?;
        Ok(dropped)
    }

    /// Check which of the model's tables exist
    pub fn check_status(&self) -> Result<SchemaStatus> {
        let mut missing = Vec::new();
        for entity in self.model.entities() {
            if !self.table_exists(entity.table)? {
                missing.push(entity.table.to_string());
            }
        }

        if missing.is_empty() {
            Ok(SchemaStatus::Created)
        } else if missing.len() == self.model.entities().len() {
            Ok(SchemaStatus::NotCreated)
        } else {
            Ok(SchemaStatus::Partial { missing })
        }
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        table_exists(self.conn, table_name)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table_name: &str) -> Result<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", quote_ident(table_name));
        let count: u64 = self.conn.query_row(&query, [], |row| row.get(0))?;
        Ok(count)
    }

    /// Names of all non-internal tables
    fn user_tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

fn table_exists(conn: &Connection, table_name: &str) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table_name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Quote an identifier for use in SQL
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
