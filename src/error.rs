//! Error types for scratchdb.

use thiserror::Error;

/// Result type alias using the scratchdb [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the connection holder, the session factory and sessions
#[derive(Error, Debug)]
pub enum Error {
    // Lifecycle errors
    #[error("Connection has not been opened; acquire it before requesting session options")]
    UninitializedConnection,

    #[error("Schema initialization failed: {reason}")]
    Initialization {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Connection has been disposed")]
    ConnectionClosed,

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    // Session errors
    #[error("Entity `{0}` is not part of the session model")]
    UnknownEntity(&'static str),

    #[error("Unknown column `{column}` on `{table}`")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Entity `{0}` has no key assigned")]
    MissingKey(&'static str),

    #[error("No row in `{table}` with key {key}")]
    RowNotFound { table: &'static str, key: i64 },

    // Engine errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl Error {
    /// Wrap a failure raised while creating the schema of a fresh connection
    pub(crate) fn initialization(source: Error) -> Self {
        Error::Initialization {
            reason: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error came from the database engine rather than from scratchdb itself
    pub fn is_database(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}
