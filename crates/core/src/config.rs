use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::error::{ConfigError, ConfigResult};

/// Logical database holding the ledger and the collections units touch
pub const DEFAULT_DATABASE: &str = "datastore";

/// Collection recording applied migrations
pub const DEFAULT_LEDGER_COLLECTION: &str = "config.migrations";

/// Output format for console logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid_value("log_format", s, "text or json")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Runtime configuration shared by every docmigrate entry point.
///
/// Unit directories are resolved below `<root>/database/`. The default seed
/// manifest lives at `<root>/database/<seeder_dir>/default.json` and does not
/// follow a seed directory passed at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrateConfig {
    /// Connection string for the document store
    pub database_url: Option<String>,
    /// Install root that the `database/` tree hangs off
    pub root: PathBuf,
    /// Migration directory name below `<root>/database`
    pub migrations_dir: String,
    /// Seed directory name below `<root>/database`
    pub seeder_dir: String,
    /// Logical database for the ledger
    pub database: String,
    /// Ledger collection name
    pub ledger_collection: String,
    /// Console log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            root: PathBuf::from("."),
            migrations_dir: "migrations".to_string(),
            seeder_dir: "seeders".to_string(),
            database: DEFAULT_DATABASE.to_string(),
            ledger_collection: DEFAULT_LEDGER_COLLECTION.to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl MigrateConfig {
    /// Load configuration from process environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        config.database_url = get("MONGO_URL");

        if let Some(root) = get("DOCMIGRATE_ROOT") {
            config.root = PathBuf::from(root);
        }
        if let Some(dir) = get("MIGRATIONS_DIR") {
            config.migrations_dir = dir;
        }
        if let Some(dir) = get("SEEDER_DIR") {
            config.seeder_dir = dir;
        }
        if let Some(database) = get("DOCMIGRATE_DATABASE") {
            config.database = database;
        }
        if let Some(collection) = get("DOCMIGRATE_LEDGER") {
            config.ledger_collection = collection;
        }
        if let Some(level) = get("CONSOLE_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = get("LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        const LEVELS: [&str; 6] = ["trace", "debug", "verbose", "info", "warn", "error"];

        if !LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "log_level",
                &self.log_level,
                "one of trace, debug, verbose, info, warn, error",
            ));
        }
        if self.database.is_empty() {
            return Err(ConfigError::invalid_value(
                "database",
                &self.database,
                "a non-empty database name",
            ));
        }
        if self.ledger_collection.is_empty() {
            return Err(ConfigError::invalid_value(
                "ledger_collection",
                &self.ledger_collection,
                "a non-empty collection name",
            ));
        }
        Ok(())
    }

    /// The connection string, or an error naming the variable to set
    pub fn require_database_url(&self) -> ConfigResult<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            ConfigError::missing_required("database_url", "Set MONGO_URL or pass --database-url.")
        })
    }

    /// Connection string with any password masked, for logs
    pub fn masked_database_url(&self) -> Option<String> {
        let raw = self.database_url.as_ref()?;
        let masked = Url::parse(raw)
            .map(|mut url| {
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            })
            .unwrap_or_else(|_| "mongodb://***".to_string());
        Some(masked)
    }

    /// `<root>/database`
    pub fn database_root(&self) -> PathBuf {
        self.root.join("database")
    }

    pub fn migrations_path(&self) -> PathBuf {
        self.database_root().join(&self.migrations_dir)
    }

    pub fn seeders_path(&self) -> PathBuf {
        self.database_root().join(&self.seeder_dir)
    }

    /// Location of the default seed manifest
    pub fn default_manifest_path(&self) -> PathBuf {
        self.seeders_path().join("default.json")
    }
}
