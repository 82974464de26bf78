//! Core database infrastructure
//!
//! This module provides the foundational components the session layer is built on:
//! - `ConnectionHolder`: lazily opened in-memory connection with deterministic teardown
//! - `ConnectionString`: parsing of in-memory connection strings
//! - `SchemaManager`: schema creation, deletion and status checks for a `Model`

mod connection;
mod connection_string;
pub(crate) mod schema;

pub use connection::{ConnectionHandle, ConnectionHolder, ConnectionStatus};
pub use connection_string::{ConnectionString, InMemoryDatabase};
pub use schema::{
    Column, ColumnType, Entity, EntitySchema, Model, ModelBuilder, SchemaManager, SchemaStatus,
};
