//! Session factory
//!
//! [`SessionFactory`] pairs a [`ConnectionHolder`] with a [`DbContext`] type. Every
//! [`get_session`](SessionFactory::get_session) call makes sure the connection is
//! open and its schema created, then builds a brand new context bound to it.

use crate::config::ScratchConfig;
use crate::database::core::{ConnectionHandle, ConnectionHolder, ConnectionStatus, ModelBuilder};
use crate::database::session::{DbContext, Session, SessionOptions};
use crate::error::Result;
use std::marker::PhantomData;

/// Hands out fresh `C` sessions over one lazily opened in-memory connection
///
/// The connection lives as long as the factory (or until [`dispose`](Self::dispose))
/// and is shared by every session the factory creates.
pub struct SessionFactory<C: DbContext> {
    holder: ConnectionHolder,
    _context: PhantomData<fn() -> C>,
}

impl<C: DbContext> SessionFactory<C> {
    /// Factory over a private anonymous in-memory database
    pub fn new() -> Self {
        Self {
            holder: ConnectionHolder::in_memory(C::model()),
            _context: PhantomData,
        }
    }

    /// Factory over the in-memory database selected by `config`
    pub fn with_config(config: &ScratchConfig) -> Result<Self> {
        Ok(Self {
            holder: ConnectionHolder::new(config, C::model())?,
            _context: PhantomData,
        })
    }

    /// Create a new session
    ///
    /// The first call opens the connection and creates the schema through a
    /// throwaway session; every call returns a distinct instance.
    pub fn get_session(&mut self) -> Result<C> {
        self.holder
            .acquire(|options| C::create(options).session().ensure_created())?;
        let options = self.holder.options()?;
        Ok(C::create(options))
    }

    /// Handle to the shared connection, once opened
    pub fn connection(&self) -> Option<ConnectionHandle> {
        self.holder.handle()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.holder.status()
    }

    pub fn holder(&self) -> &ConnectionHolder {
        &self.holder
    }

    /// Close the connection; idempotent
    pub fn dispose(&mut self) {
        self.holder.dispose();
    }
}

impl<C: DbContext> Default for SessionFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Context for code that only needs a bare [`Session`] with no entities
pub struct PlainContext {
    session: Session,
}

impl DbContext for PlainContext {
    fn configure(_model: &mut ModelBuilder) {}

    fn create(options: SessionOptions) -> Self {
        Self {
            session: Session::new(options),
        }
    }

    fn session(&self) -> &Session {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_plain_factory_lifecycle() {
        let mut factory = SessionFactory::<PlainContext>::new();
        assert_eq!(factory.status(), ConnectionStatus::Unopened);
        assert!(factory.connection().is_none());

        let first = factory.get_session().unwrap();
        let second = factory.get_session().unwrap();
        assert_eq!(factory.status(), ConnectionStatus::Open);
        assert!(first.session().shares_connection_with(second.session()));

        factory.dispose();
        factory.dispose();
        assert_eq!(factory.status(), ConnectionStatus::Closed);
        assert!(matches!(factory.get_session(), Err(Error::ConnectionClosed)));
    }

    #[test]
    fn test_with_config_rejects_file_database() {
        let config = ScratchConfig {
            connection_string: "Data Source=/tmp/scratch.db".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            SessionFactory::<PlainContext>::with_config(&config),
            Err(Error::InvalidConnectionString(_))
        ));
    }
}
