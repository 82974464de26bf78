use crate::database::core::schema::quote_ident;
use crate::database::core::{EntitySchema, Model};
use crate::error::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChangeKind {
    Insert { key: Option<i64>, values: Vec<Value> },
    Update { key: i64, values: Vec<Value> },
    Delete { key: i64 },
}

/// A queued write against one table
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingChange {
    pub table: &'static str,
    pub kind: ChangeKind,
}

impl PendingChange {
    fn statement(&self, schema: &EntitySchema) -> String {
        let table = quote_ident(schema.table);
        let key = quote_ident(schema.key);

        match &self.kind {
            ChangeKind::Insert { key: None, .. } if schema.columns.is_empty() => {
                format!("INSERT INTO {} DEFAULT VALUES", table)
            }
            ChangeKind::Insert { key: explicit, .. } => {
                let names: Vec<String> = explicit
                    .map(|_| schema.key)
                    .into_iter()
                    .chain(schema.columns.iter().map(|c| c.name))
                    .map(quote_ident)
                    .collect();
                let placeholders: Vec<String> =
                    (1..=names.len()).map(|i| format!("?{}", i)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    table,
                    names.join(", "),
                    placeholders.join(", ")
                )
            }
            ChangeKind::Update { .. } if schema.columns.is_empty() => {
                format!("UPDATE {} SET {key} = {key} WHERE {key} = ?1", table)
            }
            ChangeKind::Update { .. } => {
                let assignments: Vec<String> = schema
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, c)| format!("{} = ?{}", quote_ident(c.name), i + 1))
                    .collect();
                format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    table,
                    assignments.join(", "),
                    key,
                    schema.columns.len() + 1
                )
            }
            ChangeKind::Delete { .. } => format!("DELETE FROM {} WHERE {} = ?1", table, key),
        }
    }

    fn params(&self) -> Vec<Value> {
        match &self.kind {
            ChangeKind::Insert { key, values } => key
                .map(Value::Integer)
                .into_iter()
                .chain(values.iter().cloned())
                .collect(),
            ChangeKind::Update { key, values } => values
                .iter()
                .cloned()
                .chain(std::iter::once(Value::Integer(*key)))
                .collect(),
            ChangeKind::Delete { key } => vec![Value::Integer(*key)],
        }
    }

    /// Key an update or delete must hit
    fn target_key(&self) -> Option<i64> {
        match self.kind {
            ChangeKind::Insert { .. } => None,
            ChangeKind::Update { key, .. } | ChangeKind::Delete { key } => Some(key),
        }
    }
}

/// Ordered queue of pending changes
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    pending: Vec<PendingChange>,
}

impl ChangeTracker {
    pub fn push(&mut self, change: PendingChange) {
        self.pending.push(change);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Apply the queue in order inside one transaction
    ///
    /// An update or delete that matches no row aborts the whole batch.
    pub fn apply(&self, conn: &Connection, model: &Model) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let mut affected = 0;

        for change in &self.pending {
            let schema = model
                .schema(change.table)
                .ok_or(Error::UnknownEntity(change.table))?;
            let sql = change.statement(schema);
            trace!("{}", sql);

            let mut stmt = tx.prepare_cached(&sql)?;
            let rows = stmt.execute(params_from_iter(change.params()))?;

            if rows == 0 {
                if let Some(key) = change.target_key() {
                    return Err(Error::RowNotFound {
                        table: change.table,
                        key,
                    });
                }
            }
            affected += rows;
        }

        tx.commit()?;
        Ok(affected)
    }
}
