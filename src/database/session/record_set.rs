//! Typed access to the rows of one entity table

use super::tracker::{ChangeKind, PendingChange};
use super::Session;
use crate::database::core::schema::quote_ident;
use crate::database::core::{Entity, EntitySchema};
use crate::error::{Error, Result};
use rusqlite::{OptionalExtension, Params, ToSql};
use std::marker::PhantomData;
use tracing::trace;

/// Record set for entity `E` within a [`Session`]
///
/// `add`, `update` and `remove` are queued on the session and only reach the
/// database on [`Session::save_changes`]. Queries always read the database, so
/// they do not see queued changes.
pub struct RecordSet<'s, E: Entity> {
    session: &'s Session,
    schema: &'s EntitySchema,
    _entity: PhantomData<fn() -> E>,
}

impl<'s, E: Entity> RecordSet<'s, E> {
    pub(crate) fn new(session: &'s Session, schema: &'s EntitySchema) -> Self {
        Self {
            session,
            schema,
            _entity: PhantomData,
        }
    }

    /// Queue an insert
    ///
    /// Entities without a key receive the next sequential key when saved.
    pub fn add(&self, entity: &E) {
        self.session.track(PendingChange {
            table: E::TABLE,
            kind: ChangeKind::Insert {
                key: entity.key(),
                values: entity.to_values(),
            },
        });
    }

    /// Queue an update of every column of a stored entity
    pub fn update(&self, entity: &E) -> Result<()> {
        let key = entity.key().ok_or(Error::MissingKey(E::TABLE))?;
        self.session.track(PendingChange {
            table: E::TABLE,
            kind: ChangeKind::Update {
                key,
                values: entity.to_values(),
            },
        });
        Ok(())
    }

    /// Queue a delete of a stored entity
    pub fn remove(&self, entity: &E) -> Result<()> {
        let key = entity.key().ok_or(Error::MissingKey(E::TABLE))?;
        self.session.track(PendingChange {
            table: E::TABLE,
            kind: ChangeKind::Delete { key },
        });
        Ok(())
    }

    /// Entity with the given key, if stored
    pub fn find(&self, key: i64) -> Result<Option<E>> {
        let conn = self.session.connection()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            self.schema.select_list(),
            quote_ident(self.schema.table),
            quote_ident(self.schema.key)
        );
        trace!("{}", sql);

        let mut stmt = conn.prepare_cached(&sql)?;
        let entity = stmt.query_row([key], |row| E::from_row(row)).optional()?;
        Ok(entity)
    }

    /// Entity with the given key; fails with [`Error::RowNotFound`] if absent
    pub fn single(&self, key: i64) -> Result<E> {
        self.find(key)?.ok_or(Error::RowNotFound {
            table: E::TABLE,
            key,
        })
    }

    /// All stored entities ordered by key
    pub fn all(&self) -> Result<Vec<E>> {
        self.query("", [])
    }

    /// Entities whose `column` equals `value`, ordered by key
    pub fn find_by<V: ToSql>(&self, column: &str, value: V) -> Result<Vec<E>> {
        if !self.schema.has_column(column) {
            return Err(Error::UnknownColumn {
                table: E::TABLE,
                column: column.to_string(),
            });
        }
        let clause = format!(" WHERE {} = ?1", quote_ident(column));
        self.query(&clause, [value])
    }

    /// Stored entities matching `predicate`, ordered by key
    pub fn filter<P>(&self, mut predicate: P) -> Result<Vec<E>>
    where
        P: FnMut(&E) -> bool,
    {
        let mut entities = self.all()?;
        entities.retain(|e| predicate(e));
        Ok(entities)
    }

    /// Whether an entity with the given key is stored
    pub fn contains(&self, key: i64) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Number of stored entities
    pub fn count(&self) -> Result<u64> {
        let conn = self.session.connection()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(self.schema.table));
        trace!("{}", sql);
        let count: u64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    fn query<P: Params>(&self, clause: &str, params: P) -> Result<Vec<E>> {
        let conn = self.session.connection()?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            self.schema.select_list(),
            quote_ident(self.schema.table),
            clause,
            quote_ident(self.schema.key)
        );
        trace!("{}", sql);

        let mut stmt = conn.prepare_cached(&sql)?;
        let entities = stmt
            .query_map(params, |row| E::from_row(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entities)
    }
}
