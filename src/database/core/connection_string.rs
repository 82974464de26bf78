//! Connection string parsing
//!
//! Connection strings use the `key=value;key=value` form familiar from SQLite
//! ADO.NET providers, e.g. `Data Source=:memory:` or
//! `Data Source=fixtures;Mode=Memory;Cache=Shared`. Only in-memory databases are
//! accepted; anything that would touch the filesystem is rejected.

use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::str::FromStr;

const MEMORY: &str = ":memory:";

/// Characters that would start or extend the query part of the SQLite URI
const URI_RESERVED: &[char] = &['?', '#', '&', '%'];

/// The in-memory database a connection string selects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InMemoryDatabase {
    /// Anonymous database private to a single connection
    Private,

    /// Named database; with `shared` every connection using the name in this
    /// process sees the same data for as long as one of them stays open
    Named { name: String, shared: bool },
}

/// Parsed connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    database: InMemoryDatabase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Memory,
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cache {
    Default,
    Private,
    Shared,
}

impl Default for ConnectionString {
    fn default() -> Self {
        Self {
            database: InMemoryDatabase::Private,
        }
    }
}

impl ConnectionString {
    /// Parse a connection string
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed == MEMORY {
            return Ok(Self::default());
        }

        let mut data_source: Option<String> = None;
        let mut mode = Mode::ReadWriteCreate;
        let mut cache = Cache::Default;

        for pair in trimmed.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidConnectionString(format!("expected `key=value`, found `{}`", pair))
            })?;
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "data source" | "datasource" | "filename" => {
                    data_source = Some(value.to_string());
                }
                "mode" => mode = parse_mode(value)?,
                "cache" => cache = parse_cache(value)?,
                other => {
                    return Err(Error::InvalidConnectionString(format!(
                        "unsupported keyword `{}`",
                        other
                    )))
                }
            }
        }

        let data_source = data_source
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidConnectionString("missing `Data Source`".to_string()))?;

        let database = if data_source == MEMORY {
            InMemoryDatabase::Private
        } else if mode == Mode::Memory {
            if let Some(c) = data_source.chars().find(|c| URI_RESERVED.contains(c)) {
                return Err(Error::InvalidConnectionString(format!(
                    "in-memory database name `{}` must not contain `{}`",
                    data_source, c
                )));
            }
            InMemoryDatabase::Named {
                name: data_source,
                shared: cache == Cache::Shared,
            }
        } else {
            return Err(Error::InvalidConnectionString(format!(
                "`{}` is not an in-memory database; use `:memory:` or `Mode=Memory`",
                data_source
            )));
        };

        Ok(Self { database })
    }

    /// The in-memory database this connection string selects
    pub fn database(&self) -> &InMemoryDatabase {
        &self.database
    }

    /// Open a new connection to the selected database
    pub(crate) fn open(&self) -> Result<Connection> {
        let conn = match &self.database {
            InMemoryDatabase::Private => Connection::open_in_memory()?,
            InMemoryDatabase::Named { .. } => {
                Connection::open_with_flags(self.uri(), OpenFlags::default())?
            }
        };
        Ok(conn)
    }

    /// SQLite URI for the selected database
    pub fn uri(&self) -> String {
        match &self.database {
            InMemoryDatabase::Private => MEMORY.to_string(),
            InMemoryDatabase::Named { name, shared } => {
                let mut uri = format!("file:{}?mode=memory", name);
                if *shared {
                    uri.push_str("&cache=shared");
                }
                uri
            }
        }
    }
}

fn parse_mode(value: &str) -> Result<Mode> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(Mode::Memory),
        "readwritecreate" => Ok(Mode::ReadWriteCreate),
        "readwrite" => Ok(Mode::ReadWrite),
        "readonly" => Ok(Mode::ReadOnly),
        _ => Err(Error::InvalidConnectionString(format!(
            "unknown mode `{}`",
            value
        ))),
    }
}

fn parse_cache(value: &str) -> Result<Cache> {
    match value.to_ascii_lowercase().as_str() {
        "default" => Ok(Cache::Default),
        "private" => Ok(Cache::Private),
        "shared" => Ok(Cache::Shared),
        _ => Err(Error::InvalidConnectionString(format!(
            "unknown cache mode `{}`",
            value
        ))),
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.database {
            InMemoryDatabase::Private => write!(f, "Data Source={}", MEMORY),
            InMemoryDatabase::Named { name, shared } => {
                write!(f, "Data Source={};Mode=Memory", name)?;
                if *shared {
                    write!(f, ";Cache=Shared")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_private_memory() {
        for input in [
            ":memory:",
            "DataSource=:memory:",
            "Data Source=:memory:",
            "data source = :memory: ;",
            "Filename=:memory:",
        ] {
            let cs = ConnectionString::parse(input).unwrap();
            assert_eq!(cs.database(), &InMemoryDatabase::Private, "{}", input);
        }
    }

    #[test]
    fn test_parse_named_shared() {
        let cs = ConnectionString::parse("Data Source=fixtures;Mode=Memory;Cache=Shared").unwrap();
        assert_eq!(
            cs.database(),
            &InMemoryDatabase::Named {
                name: "fixtures".to_string(),
                shared: true
            }
        );
        assert_eq!(cs.uri(), "file:fixtures?mode=memory&cache=shared");
        assert_eq!(
            cs.to_string(),
            "Data Source=fixtures;Mode=Memory;Cache=Shared"
        );
    }

    #[test]
    fn test_parse_named_private_cache() {
        let cs = ConnectionString::parse("Data Source=scratch;mode=memory").unwrap();
        assert_eq!(cs.uri(), "file:scratch?mode=memory");
    }

    #[test]
    fn test_reject_file_database() {
        let err = ConnectionString::parse("Data Source=/tmp/app.db").unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionString(_)));

        let err = ConnectionString::parse("Data Source=app.db;Mode=ReadWrite").unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionString(_)));
    }

    #[test]
    fn test_reject_malformed() {
        for input in [
            "",
            "Data Source=",
            "Mode=Memory",
            "Data Source",
            "Data Source=:memory:;Pooling=True",
            "Data Source=x;Mode=Disk",
            "Data Source=x;Mode=Memory;Cache=Sometimes",
        ] {
            assert!(
                matches!(
                    ConnectionString::parse(input),
                    Err(Error::InvalidConnectionString(_))
                ),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_reject_uri_parameters_in_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("leak.db");
        let input = format!("Data Source={}?mode=rwc&x=;Mode=Memory", file.display());
        assert!(matches!(
            ConnectionString::parse(&input),
            Err(Error::InvalidConnectionString(_))
        ));

        for name in ["a#b", "a&b", "a%3Fb", "a?b"] {
            let input = format!("Data Source={};Mode=Memory;Cache=Shared", name);
            assert!(
                matches!(
                    ConnectionString::parse(&input),
                    Err(Error::InvalidConnectionString(_))
                ),
                "{}",
                name
            );
        }
        assert!(!file.exists());
    }

    #[test]
    fn test_open_private() {
        let cs: ConnectionString = "Data Source=:memory:".parse().unwrap();
        let conn = cs.open().unwrap();
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);
    }
}
