//! Connection lifecycle management
//!
//! [`ConnectionHolder`] owns at most one in-memory SQLite connection. The connection
//! is opened lazily on the first [`ConnectionHolder::acquire`], the schema is created
//! right after opening, and the connection is closed on [`ConnectionHolder::dispose`]
//! or when the holder is dropped. Sessions only ever see a [`ConnectionHandle`],
//! a non-owning reference that stops working once the holder lets go.
//!
//! The holder is built on `Rc`/`Weak` and is meant for single-threaded test code.

use super::connection_string::ConnectionString;
use super::schema::Model;
use crate::config::ScratchConfig;
use crate::database::session::SessionOptions;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::fmt;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// Non-owning handle to the connection of a [`ConnectionHolder`]
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    conn: Weak<Connection>,
}

impl ConnectionHandle {
    fn new(conn: &Rc<Connection>) -> Self {
        Self {
            conn: Rc::downgrade(conn),
        }
    }

    /// Whether the underlying connection is still alive
    pub fn is_open(&self) -> bool {
        self.conn.strong_count() > 0
    }

    /// Whether both handles refer to the same connection
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Weak::ptr_eq(&self.conn, &other.conn)
    }

    /// Run `f` against the connection
    ///
    /// Fails with [`Error::ConnectionClosed`] once the holder has been disposed.
    pub fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.upgrade()?;
        f(&conn)
    }

    pub(crate) fn upgrade(&self) -> Result<Rc<Connection>> {
        self.conn.upgrade().ok_or(Error::ConnectionClosed)
    }
}

/// Lifecycle state of a holder's connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unopened,
    Open,
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Unopened => "unopened",
            ConnectionStatus::Open => "open",
            ConnectionStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

enum ConnectionState {
    Unopened,
    Open(Rc<Connection>),
    Closed,
}

/// Owner of a single lazily opened in-memory connection
pub struct ConnectionHolder {
    connection_string: ConnectionString,
    foreign_keys: bool,
    model: Rc<Model>,
    state: ConnectionState,
}

impl ConnectionHolder {
    /// Create a holder for the connection described by `config`
    ///
    /// Nothing is opened until the first [`acquire`](Self::acquire).
    pub fn new(config: &ScratchConfig, model: Model) -> Result<Self> {
        let connection_string = ConnectionString::parse(&config.connection_string)?;
        Ok(Self {
            connection_string,
            foreign_keys: config.foreign_keys,
            model: Rc::new(model),
            state: ConnectionState::Unopened,
        })
    }

    /// Create a holder for a private anonymous in-memory database
    pub fn in_memory(model: Model) -> Self {
        let config = ScratchConfig::default();
        Self {
            connection_string: ConnectionString::default(),
            foreign_keys: config.foreign_keys,
            model: Rc::new(model),
            state: ConnectionState::Unopened,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        match self.state {
            ConnectionState::Unopened => ConnectionStatus::Unopened,
            ConnectionState::Open(_) => ConnectionStatus::Open,
            ConnectionState::Closed => ConnectionStatus::Closed,
        }
    }

    pub fn model(&self) -> &Rc<Model> {
        &self.model
    }

    pub fn connection_string(&self) -> &ConnectionString {
        &self.connection_string
    }

    /// Handle to the open connection, if any
    pub fn handle(&self) -> Option<ConnectionHandle> {
        match &self.state {
            ConnectionState::Open(conn) => Some(ConnectionHandle::new(conn)),
            _ => None,
        }
    }

    /// Open the connection if needed and return a handle to it
    ///
    /// On the first call a new connection is opened and configured, and `initialize`
    /// receives options bound to it; it is expected to build a throwaway session and
    /// create the schema, returning whether creation succeeded. A `false` result or
    /// an error fails the call with [`Error::Initialization`] and releases the
    /// connection again. Later calls return the existing handle without side effects.
    pub fn acquire<F>(&mut self, initialize: F) -> Result<ConnectionHandle>
    where
        F: FnOnce(SessionOptions) -> Result<bool>,
    {
        match &self.state {
            ConnectionState::Open(conn) => return Ok(ConnectionHandle::new(conn)),
            ConnectionState::Closed => return Err(Error::ConnectionClosed),
            ConnectionState::Unopened => {}
        }

        let conn = Rc::new(self.open()?);
        let handle = ConnectionHandle::new(&conn);
        self.state = ConnectionState::Open(conn);

        match self.options().and_then(initialize) {
            Ok(true) => Ok(handle),
            Ok(false) => {
                self.release(ConnectionState::Unopened);
                Err(Error::Initialization {
                    reason: format!(
                        "schema creation reported an already initialized database ({})",
                        self.connection_string
                    ),
                    source: None,
                })
            }
            Err(e) => {
                self.release(ConnectionState::Unopened);
                Err(Error::initialization(e))
            }
        }
    }

    /// Session options bound to the open connection
    pub fn options(&self) -> Result<SessionOptions> {
        match &self.state {
            ConnectionState::Open(conn) => SessionOptions::builder()
                .use_connection(&ConnectionHandle::new(conn))
                .model(Rc::clone(&self.model))
                .build(),
            ConnectionState::Unopened => Err(Error::UninitializedConnection),
            ConnectionState::Closed => Err(Error::ConnectionClosed),
        }
    }

    /// Close and release the connection
    ///
    /// Safe to call any number of times, including before the first acquire. The
    /// holder cannot be reopened afterwards.
    pub fn dispose(&mut self) {
        if !matches!(self.state, ConnectionState::Closed) {
            self.release(ConnectionState::Closed);
        }
    }

    fn open(&self) -> Result<Connection> {
        let conn = self.connection_string.open()?;
        configure(&conn, self.foreign_keys)?;
        debug!("Opened in-memory connection ({})", self.connection_string);
        Ok(conn)
    }

    fn release(&mut self, next: ConnectionState) {
        if let ConnectionState::Open(conn) = std::mem::replace(&mut self.state, next) {
            close(conn);
            debug!("Released in-memory connection ({})", self.connection_string);
        }
    }
}

impl Drop for ConnectionHolder {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Apply per-connection settings
fn configure(conn: &Connection, foreign_keys: bool) -> Result<()> {
    let pragma = if foreign_keys {
        "PRAGMA foreign_keys=ON"
    } else {
        "PRAGMA foreign_keys=OFF"
    };
    conn.execute_batch(pragma)?;

    // Store temp tables in memory
    conn.execute_batch("PRAGMA temp_store=MEMORY")?;

    Ok(())
}

fn close(conn: Rc<Connection>) {
    match Rc::try_unwrap(conn) {
        Ok(conn) => {
            if let Err((_, e)) = conn.close() {
                warn!("Failed to close in-memory connection: {}", e);
            }
        }
        // only reachable while a `ConnectionHandle::with` closure is running
        Err(_) => warn!("Connection still in use; it closes when the last user returns"),
    }
}
