//! Sessions over a held connection
//!
//! A [`Session`] is a short-lived unit of work: record sets queue inserts, updates
//! and deletes, [`Session::save_changes`] applies them in one transaction, and reads
//! go straight to the database. Sessions reference their connection weakly through
//! [`SessionOptions`], so dropping a session never affects the connection and
//! using one after its holder was disposed fails with
//! [`Error::ConnectionClosed`](crate::Error::ConnectionClosed).

mod record_set;
mod tracker;

pub use record_set::RecordSet;

use crate::database::core::{
    ConnectionHandle, Entity, Model, ModelBuilder, SchemaManager, SchemaStatus,
};
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::cell::RefCell;
use std::rc::Rc;
use tracker::{ChangeTracker, PendingChange};

/// Configuration a session is constructed from
#[derive(Debug, Clone)]
pub struct SessionOptions {
    connection: ConnectionHandle,
    model: Rc<Model>,
}

impl SessionOptions {
    pub fn builder() -> SessionOptionsBuilder {
        SessionOptionsBuilder::default()
    }

    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    pub fn model(&self) -> &Model {
        &self.model
    }
}

/// Builder for [`SessionOptions`]
#[derive(Debug, Default)]
pub struct SessionOptionsBuilder {
    connection: Option<ConnectionHandle>,
    model: Option<Rc<Model>>,
}

impl SessionOptionsBuilder {
    /// Bind the options to an open connection
    pub fn use_connection(mut self, connection: &ConnectionHandle) -> Self {
        self.connection = Some(connection.clone());
        self
    }

    pub fn model(mut self, model: Rc<Model>) -> Self {
        self.model = Some(model);
        self
    }

    /// Fails with [`Error::UninitializedConnection`] when no connection was given
    pub fn build(self) -> Result<SessionOptions> {
        let connection = self.connection.ok_or(Error::UninitializedConnection)?;
        Ok(SessionOptions {
            connection,
            model: self.model.unwrap_or_default(),
        })
    }
}

/// A concrete session type handed out by a
/// [`SessionFactory`](crate::database::SessionFactory)
///
/// Implementors register their entities in `configure` and wrap the [`Session`]
/// built from the options passed to `create`:
///
/// ```rust,ignore
/// struct ShopContext {
///     session: Session,
/// }
///
/// impl DbContext for ShopContext {
///     fn configure(model: &mut ModelBuilder) {
///         model.entity::<Customer>().entity::<Order>();
///     }
///
///     fn create(options: SessionOptions) -> Self {
///         Self { session: Session::new(options) }
///     }
///
///     fn session(&self) -> &Session {
///         &self.session
///     }
/// }
/// ```
pub trait DbContext: Sized {
    /// Register the entities this context exposes
    fn configure(model: &mut ModelBuilder);

    /// Construct the context from options bound to an open connection
    fn create(options: SessionOptions) -> Self;

    fn session(&self) -> &Session;

    /// The model produced by `configure`
    fn model() -> Model {
        let mut builder = Model::builder();
        Self::configure(&mut builder);
        builder.build()
    }
}

/// Unit of work over one connection
#[derive(Debug)]
pub struct Session {
    options: SessionOptions,
    tracker: RefCell<ChangeTracker>,
}

impl Session {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            tracker: RefCell::new(ChangeTracker::default()),
        }
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Create the model's tables if the database is empty
    ///
    /// Returns `false` when the database already holds tables.
    pub fn ensure_created(&self) -> Result<bool> {
        let conn = self.connection()?;
        SchemaManager::new(&conn, self.options.model()).ensure_created()
    }

    /// Drop the model's tables; returns whether anything was dropped
    pub fn ensure_deleted(&self) -> Result<bool> {
        let conn = self.connection()?;
        SchemaManager::new(&conn, self.options.model()).ensure_deleted()
    }

    pub fn schema_status(&self) -> Result<SchemaStatus> {
        let conn = self.connection()?;
        SchemaManager::new(&conn, self.options.model()).check_status()
    }

    /// Record set for entity `E`
    ///
    /// Fails with [`Error::UnknownEntity`] if `E` is not part of the model.
    pub fn set<E: Entity>(&self) -> Result<RecordSet<'_, E>> {
        let schema = self
            .options
            .model()
            .schema(E::TABLE)
            .ok_or(Error::UnknownEntity(E::TABLE))?;
        Ok(RecordSet::new(self, schema))
    }

    /// Apply every queued change in one transaction
    ///
    /// Returns the number of affected rows. On failure nothing is applied and the
    /// queue is kept.
    pub fn save_changes(&self) -> Result<usize> {
        if self.tracker.borrow().is_empty() {
            return Ok(0);
        }

        let conn = self.connection()?;
        let affected = self.tracker.borrow().apply(&conn, self.options.model())?;
        self.tracker.borrow_mut().clear();
        Ok(affected)
    }

    pub fn has_changes(&self) -> bool {
        !self.tracker.borrow().is_empty()
    }

    /// Number of queued changes
    pub fn pending_changes(&self) -> usize {
        self.tracker.borrow().len()
    }

    /// Drop every queued change without applying it
    pub fn discard_changes(&self) {
        self.tracker.borrow_mut().clear();
    }

    /// Whether both sessions are bound to the same connection
    pub fn shares_connection_with(&self, other: &Session) -> bool {
        self.options
            .connection()
            .same_connection(other.options.connection())
    }

    pub(crate) fn connection(&self) -> Result<Rc<Connection>> {
        self.options.connection().upgrade()
    }

    pub(crate) fn track(&self, change: PendingChange) {
        self.tracker.borrow_mut().push(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::{Column, ConnectionHolder};
    use rusqlite::types::Value;
    use rusqlite::Row;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: i64,
        body: String,
    }

    impl Note {
        fn new(body: &str) -> Self {
            Self {
                id: 0,
                body: body.to_string(),
            }
        }
    }

    impl Entity for Note {
        const TABLE: &'static str = "notes";

        fn columns() -> Vec<Column> {
            vec![Column::text("body")]
        }

        fn key(&self) -> Option<i64> {
            (self.id > 0).then_some(self.id)
        }

        fn to_values(&self) -> Vec<Value> {
            vec![Value::Text(self.body.clone())]
        }

        fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self {
                id: row.get(0)?,
                body: row.get(1)?,
            })
        }
    }

    struct Unregistered;

    impl Entity for Unregistered {
        const TABLE: &'static str = "unregistered";

        fn columns() -> Vec<Column> {
            vec![]
        }

        fn key(&self) -> Option<i64> {
            None
        }

        fn to_values(&self) -> Vec<Value> {
            vec![]
        }

        fn from_row(_row: &Row<'_>) -> rusqlite::Result<Self> {
            Ok(Unregistered)
        }
    }

    fn open_holder() -> ConnectionHolder {
        let mut builder = Model::builder();
        builder.entity::<Note>();
        let mut holder = ConnectionHolder::in_memory(builder.build());
        holder
            .acquire(|options| Session::new(options).ensure_created())
            .unwrap();
        holder
    }

    #[test]
    fn test_builder_requires_connection() {
        let result = SessionOptions::builder()
            .model(Rc::new(Model::default()))
            .build();
        assert!(matches!(result, Err(Error::UninitializedConnection)));
    }

    #[test]
    fn test_unknown_entity() {
        let holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        assert!(matches!(
            session.set::<Unregistered>(),
            Err(Error::UnknownEntity("unregistered"))
        ));
    }

    #[test]
    fn test_changes_are_queued_until_saved() {
        let holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        let notes = session.set::<Note>().unwrap();

        notes.add(&Note::new("first"));
        notes.add(&Note::new("second"));
        assert_eq!(session.pending_changes(), 2);
        assert_eq!(notes.count().unwrap(), 0);

        assert_eq!(session.save_changes().unwrap(), 2);
        assert!(!session.has_changes());
        assert_eq!(notes.count().unwrap(), 2);
        assert_eq!(session.save_changes().unwrap(), 0);
    }

    #[test]
    fn test_discard_changes() {
        let holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        let notes = session.set::<Note>().unwrap();

        notes.add(&Note::new("dropped"));
        session.discard_changes();
        assert_eq!(session.save_changes().unwrap(), 0);
        assert_eq!(notes.count().unwrap(), 0);
    }

    #[test]
    fn test_failed_save_keeps_queue_and_rolls_back() {
        let holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        let notes = session.set::<Note>().unwrap();

        notes.add(&Note::new("kept out"));
        notes
            .update(&Note {
                id: 42,
                body: "missing".to_string(),
            })
            .unwrap();

        assert!(matches!(
            session.save_changes(),
            Err(Error::RowNotFound {
                table: "notes",
                key: 42
            })
        ));
        assert_eq!(session.pending_changes(), 2);
        assert_eq!(notes.count().unwrap(), 0);
    }

    #[test]
    fn test_dropping_session_keeps_connection() {
        let holder = open_holder();
        {
            let session = Session::new(holder.options().unwrap());
            session.set::<Note>().unwrap().add(&Note::new("persisted"));
            session.save_changes().unwrap();
        }

        let session = Session::new(holder.options().unwrap());
        assert_eq!(session.set::<Note>().unwrap().count().unwrap(), 1);
    }

    #[test]
    fn test_session_after_dispose() {
        let mut holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        holder.dispose();

        assert!(matches!(
            session.set::<Note>().unwrap().all(),
            Err(Error::ConnectionClosed)
        ));
        assert!(matches!(
            session.ensure_created(),
            Err(Error::ConnectionClosed)
        ));
    }

    #[test]
    fn test_ensure_deleted() {
        let holder = open_holder();
        let session = Session::new(holder.options().unwrap());
        assert_eq!(session.schema_status().unwrap(), SchemaStatus::Created);
        assert!(session.ensure_deleted().unwrap());
        assert_eq!(session.schema_status().unwrap(), SchemaStatus::NotCreated);
        assert!(session.ensure_created().unwrap());
    }
}
