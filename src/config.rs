use anyhow::{anyhow, Result};
use config::Config;
use serde::Deserialize;
use std::path::Path;

/// Connection settings for scratch databases
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Connection string selecting an in-memory database (default: `Data Source=:memory:`)
    pub connection_string: String,

    /// Enforce foreign key constraints on every connection (default: true)
    pub foreign_keys: bool,
}

pub const DEFAULT_CONNECTION_STRING: &str = "Data Source=:memory:";

/// Prefix of environment variables read by [`ScratchConfig::new`]
pub const ENV_PREFIX: &str = "SCRATCHDB";

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            foreign_keys: true,
        }
    }
}

impl ScratchConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Sources, later ones winning: built-in defaults, the TOML file at `path` (which
    /// must exist when given), a `.env` file in the working directory, and
    /// `SCRATCHDB_*` environment variables.
    pub fn new(path: &Option<String>) -> Result<ScratchConfig> {
        Self::load(path, ENV_PREFIX)
    }

    /// Same as [`new`](Self::new), reading `<env_prefix>_*` environment variables
    pub fn load(path: &Option<String>, env_prefix: &str) -> Result<ScratchConfig> {
        let defaults = ScratchConfig::default();
        let mut builder = Config::builder()
            .set_default("connection_string", defaults.connection_string)
            .map_err(|e| anyhow!("Failed to set default connection string: {}", e))?
            .set_default("foreign_keys", defaults.foreign_keys)
            .map_err(|e| anyhow!("Failed to set default foreign_keys: {}", e))?;

        // Add in toml configuration file
        if let Some(p) = path {
            let path = Path::new(p.as_str());
            if !path.exists() {
                return Err(anyhow!("Configuration file {} does not exist", p));
            }
            builder = builder.add_source(config::File::from(path));
        }

        // Pick up a .env file if there is one
        dotenvy::dotenv().ok();

        // Add in settings from the environment (with a prefix of SCRATCHDB by default)
        // E.g., `SCRATCHDB_FOREIGN_KEYS=false cargo test` turns foreign keys off
        let env = config::Environment::with_prefix(env_prefix).try_parsing(true);
        builder = builder.add_source(env);

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        settings
            .try_deserialize::<ScratchConfig>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let lines = [
            format!("Connection String:  {}", self.connection_string),
            format!("Foreign Keys:       {}", self.foreign_keys),
        ];
        lines.join("\n")
    }
}
