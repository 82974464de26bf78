//! Database module
//!
//! This module provides all database functionality for scratchdb, organized into:
//!
//! - **core**: connection lifecycle, connection strings, schema management
//! - **session**: sessions, record sets and the `DbContext` extension point
//! - **factory**: `SessionFactory`, tying a connection holder to a context type
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/                  # Foundation
//! │   ├── connection         # ConnectionHolder / ConnectionHandle
//! │   ├── connection_string  # `Data Source=:memory:` parsing
//! │   └── schema             # Entity, Model, SchemaManager
//! │
//! ├── session/               # Unit of work
//! │   ├── record_set         # typed add / update / remove / query
//! │   └── tracker            # queued changes applied by save_changes
//! │
//! └── factory                # SessionFactory<C: DbContext>
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use scratchdb::database::SessionFactory;
//!
//! let mut factory = SessionFactory::<ShopContext>::new();
//! let ctx = factory.get_session()?;
//!
//! let customers = ctx.session().set::<Customer>()?;
//! customers.add(&Customer::new("Ada"));
//! ctx.session().save_changes()?;
//!
//! assert_eq!(customers.count()?, 1);
//! // dropping the factory closes the in-memory database
//! ```

pub mod core;
pub mod factory;
pub mod session;

// Connection lifecycle and schema management
pub use core::{
    Column, ColumnType, ConnectionHandle, ConnectionHolder, ConnectionStatus, ConnectionString,
    Entity, EntitySchema, InMemoryDatabase, Model, ModelBuilder, SchemaManager, SchemaStatus,
};

// Sessions
pub use session::{DbContext, RecordSet, Session, SessionOptions, SessionOptionsBuilder};

// Factory
pub use factory::{PlainContext, SessionFactory};
