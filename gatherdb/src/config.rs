//! Store configuration.
//!
//! Loaded from environment variables by the command-line front end; library
//! users can build a [`StoreConfig`] directly.
//!
//! # Environment Variables
//!
//! - `GATHERDB_DATA_DIRECTORY`: root of all collections (default: `./data`)
//! - `GATHERDB_LOCK_TIMEOUT_MS`: bounded wait for a collection lock (default: `100`)
//! - `GATHERDB_TEXT_BLOCK_SIZE`: block capacity of unsized text blobs (default: `4096`)
//! - `GATHERDB_AUTO_FLUSH`: flush columns after every write (default: `true`)
//!
//! # Invariants
//!
//! - `text_block_size` always leaves room for at least one payload byte
//!   after the block header.

use std::path::PathBuf;
use std::time::Duration;

use crate::storage::SIZE_BLOCK_HEADER_SIZE;

/// Store configuration.
///
/// # Post-conditions
///
/// When constructed via `from_env()`, every field holds either the parsed
/// environment value or its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory. A collection lives at `{data_directory}/{database}/{collection}/`.
    pub data_directory: PathBuf,
    /// How long a read or write waits for the collection lock before failing.
    pub lock_timeout: Duration,
    /// Block capacity of the blob file behind a text column declared without a size.
    pub text_block_size: u32,
    /// Flush every touched column at the end of each write.
    pub auto_flush: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_directory: PathBuf::from(Self::DEFAULT_DATA_DIRECTORY),
            lock_timeout: Duration::from_millis(Self::DEFAULT_LOCK_TIMEOUT_MS),
            text_block_size: Self::DEFAULT_TEXT_BLOCK_SIZE,
            auto_flush: Self::DEFAULT_AUTO_FLUSH,
        }
    }
}

impl StoreConfig {
    /// Default data directory.
    pub const DEFAULT_DATA_DIRECTORY: &'static str = "./data";
    /// Default lock timeout in milliseconds.
    pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 100;
    /// Default block capacity for unsized text.
    pub const DEFAULT_TEXT_BLOCK_SIZE: u32 = 4096;
    /// Default flush policy.
    pub const DEFAULT_AUTO_FLUSH: bool = true;

    /// Default configuration rooted at `data_directory`.
    #[must_use]
    pub fn with_data_directory(data_directory: impl Into<PathBuf>) -> Self {
        Self {
            data_directory: data_directory.into(),
            ..Self::default()
        }
    }

    /// Directory holding the files of one collection.
    #[must_use]
    pub fn collection_directory(&self, database: &str, collection: &str) -> PathBuf {
        self.data_directory.join(database).join(collection)
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// text block size leaves no room for payload.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_directory = lookup("GATHERDB_DATA_DIRECTORY")
            .map_or_else(|| PathBuf::from(Self::DEFAULT_DATA_DIRECTORY), PathBuf::from);
        let lock_timeout = Self::load_lock_timeout(lookup("GATHERDB_LOCK_TIMEOUT_MS"))?;
        let text_block_size = Self::load_text_block_size(lookup("GATHERDB_TEXT_BLOCK_SIZE"))?;
        let auto_flush = Self::load_auto_flush(lookup("GATHERDB_AUTO_FLUSH"))?;

        Ok(Self {
            data_directory,
            lock_timeout,
            text_block_size,
            auto_flush,
        })
    }

    fn load_lock_timeout(value: Option<String>) -> Result<Duration, ConfigError> {
        match value {
            Some(value) => value.parse::<u64>().map(Duration::from_millis).map_err(|_| {
                ConfigError::InvalidValue {
                    name: "GATHERDB_LOCK_TIMEOUT_MS".to_string(),
                    message: format!("'{value}' is not a number of milliseconds"),
                }
            }),
            None => Ok(Duration::from_millis(Self::DEFAULT_LOCK_TIMEOUT_MS)),
        }
    }

    fn load_text_block_size(value: Option<String>) -> Result<u32, ConfigError> {
        let Some(value) = value else {
            return Ok(Self::DEFAULT_TEXT_BLOCK_SIZE);
        };
        let invalid = |message: String| ConfigError::InvalidValue {
            name: "GATHERDB_TEXT_BLOCK_SIZE".to_string(),
            message,
        };
        let size = value
            .parse::<u32>()
            .map_err(|_| invalid(format!("'{value}' is not a block size")))?;
        if (size as usize) <= SIZE_BLOCK_HEADER_SIZE {
            return Err(invalid(format!(
                "{size} leaves no room after the {SIZE_BLOCK_HEADER_SIZE}-byte block header"
            )));
        }
        Ok(size)
    }

    fn load_auto_flush(value: Option<String>) -> Result<bool, ConfigError> {
        match value.as_deref() {
            None => Ok(Self::DEFAULT_AUTO_FLUSH),
            Some("true" | "1") => Ok(true),
            Some("false" | "0") => Ok(false),
            Some(other) => Err(ConfigError::InvalidValue {
                name: "GATHERDB_AUTO_FLUSH".to_string(),
                message: format!("'{other}' is not one of true, false, 1, 0"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = StoreConfig::from_lookup(lookup(&[])).expect("defaults");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.data_directory, PathBuf::from("./data"));
        assert_eq!(config.lock_timeout, Duration::from_millis(100));
        assert_eq!(config.text_block_size, 4096);
        assert!(config.auto_flush);
    }

    #[test]
    fn test_values_from_environment() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("GATHERDB_DATA_DIRECTORY", "/srv/gather"),
            ("GATHERDB_LOCK_TIMEOUT_MS", "250"),
            ("GATHERDB_TEXT_BLOCK_SIZE", "512"),
            ("GATHERDB_AUTO_FLUSH", "false"),
        ]))
        .expect("config");
        assert_eq!(config.data_directory, PathBuf::from("/srv/gather"));
        assert_eq!(config.lock_timeout, Duration::from_millis(250));
        assert_eq!(config.text_block_size, 512);
        assert!(!config.auto_flush);
        assert_eq!(
            config.collection_directory("shop", "orders"),
            PathBuf::from("/srv/gather/shop/orders")
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let error = StoreConfig::from_lookup(lookup(&[("GATHERDB_LOCK_TIMEOUT_MS", "soon")]))
            .expect_err("timeout");
        assert!(matches!(error, ConfigError::InvalidValue { ref name, .. } if name == "GATHERDB_LOCK_TIMEOUT_MS"));

        let error = StoreConfig::from_lookup(lookup(&[("GATHERDB_TEXT_BLOCK_SIZE", "12")]))
            .expect_err("block size");
        assert!(error.to_string().contains("no room"));

        let error =
            StoreConfig::from_lookup(lookup(&[("GATHERDB_AUTO_FLUSH", "maybe")])).expect_err("flush");
        assert_eq!(
            error.to_string(),
            "invalid value for GATHERDB_AUTO_FLUSH: 'maybe' is not one of true, false, 1, 0"
        );
    }
}
