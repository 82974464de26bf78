#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! scratchdb - throwaway in-memory SQLite sessions for unit tests
//!
//! A [`SessionFactory`] owns a single in-memory SQLite connection. The connection is
//! opened on the first [`SessionFactory::get_session`] call, the schema of the
//! context's model is created exactly once right after opening, and the connection
//! is closed when the factory is disposed or dropped. Every `get_session` call
//! returns a new context bound to that same connection, and two factories never see
//! each other's data.
//!
//! # Architecture
//!
//! - **[`database`]**: all database functionality
//!   - `core`: connection lifecycle, connection strings, schema management
//!   - `session`: sessions, record sets, the [`DbContext`] extension point
//!   - `factory`: [`SessionFactory`]
//!
//! - **[`config`]**: connection settings from defaults, TOML and `SCRATCHDB_*` env vars
//!
//! - **[`error`]**: the crate [`Error`] type
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use scratchdb::{Column, DbContext, Entity, ModelBuilder, Session, SessionFactory, SessionOptions};
//! use rusqlite::types::Value;
//!
//! struct Person {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl Entity for Person {
//!     const TABLE: &'static str = "persons";
//!
//!     fn columns() -> Vec<Column> {
//!         vec![Column::text("name").max_length(50)]
//!     }
//!
//!     fn key(&self) -> Option<i64> {
//!         (self.id > 0).then_some(self.id)
//!     }
//!
//!     fn to_values(&self) -> Vec<Value> {
//!         vec![Value::Text(self.name.clone())]
//!     }
//!
//!     fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
//!         Ok(Self { id: row.get(0)?, name: row.get(1)? })
//!     }
//! }
//!
//! struct PeopleContext {
//!     session: Session,
//! }
//!
//! impl DbContext for PeopleContext {
//!     fn configure(model: &mut ModelBuilder) {
//!         model.entity::<Person>();
//!     }
//!
//!     fn create(options: SessionOptions) -> Self {
//!         Self { session: Session::new(options) }
//!     }
//!
//!     fn session(&self) -> &Session {
//!         &self.session
//!     }
//! }
//!
//! let mut factory = SessionFactory::<PeopleContext>::new();
//! let ctx = factory.get_session()?;
//! let persons = ctx.session().set::<Person>()?;
//!
//! persons.add(&Person { id: 0, name: "Ada".to_string() });
//! ctx.session().save_changes()?;
//!
//! assert_eq!(persons.single(1)?.name, "Ada");
//! ```

pub mod config;
pub mod database;
pub mod error;

// =============================================================================
// Configuration
// =============================================================================

pub use crate::config::{ScratchConfig, DEFAULT_CONNECTION_STRING};

// =============================================================================
// Errors
// =============================================================================

pub use error::{Error, Result};

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Connection lifecycle
pub use database::{
    ConnectionHandle, ConnectionHolder, ConnectionStatus, ConnectionString, InMemoryDatabase,
};

// Schema
pub use database::{
    Column, ColumnType, Entity, EntitySchema, Model, ModelBuilder, SchemaManager, SchemaStatus,
};

// Sessions
pub use database::{
    DbContext, PlainContext, RecordSet, Session, SessionFactory, SessionOptions,
    SessionOptionsBuilder,
};
