//! Document configuration via `verso.toml`
//!
//! On first open of a document directory a default `verso.toml` is created
//! next to the stored history. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use verso_core::{HistoryError, HistoryResult};
use verso_storage::{get_codec, StorageCodec};

/// Config file name placed in the document directory.
pub const CONFIG_FILE_NAME: &str = "verso.toml";

/// Storage key the history blob lives under by default.
pub const DEFAULT_STORAGE_KEY: &str = "document-versions";

/// Quiet period before a requested save is committed.
pub const DEFAULT_SAVE_DEBOUNCE_MS: u64 = 1000;

/// Document configuration loaded from `verso.toml`.
///
/// # Example
///
/// ```toml
/// storage_key = "document-versions"
/// save_debounce_ms = 1000
/// codec = "identity"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersoConfig {
    /// Key the history blob is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Debounce window for save requests, in milliseconds.
    #[serde(default = "default_save_debounce_ms")]
    pub save_debounce_ms: u64,
    /// Codec applied to bytes on disk.
    #[serde(default = "default_codec")]
    pub codec: String,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_save_debounce_ms() -> u64 {
    DEFAULT_SAVE_DEBOUNCE_MS
}

fn default_codec() -> String {
    "identity".to_string()
}

impl Default for VersoConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            save_debounce_ms: default_save_debounce_ms(),
            codec: default_codec(),
        }
    }
}

impl VersoConfig {
    /// Debounce window as a `Duration`.
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Instantiate the configured codec.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec id is unknown.
    pub fn codec(&self) -> HistoryResult<Box<dyn StorageCodec>> {
        get_codec(&self.codec).map_err(|e| {
            HistoryError::config(format!("codec '{}' in {}: {}", self.codec, CONFIG_FILE_NAME, e))
        })
    }

    /// Check every field eagerly.
    pub fn validate(&self) -> HistoryResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(HistoryError::config(format!(
                "storage_key in {} must not be empty",
                CONFIG_FILE_NAME
            )));
        }
        self.codec().map(|_| ())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Verso document configuration
#
# Key the history blob is stored under (default: "document-versions")
storage_key = "document-versions"

# Quiet period in milliseconds before a save request is committed.
# Rapid edits inside the window collapse into one version.
save_debounce_ms = 1000

# Codec for bytes on disk: "identity" (default)
codec = "identity"
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> HistoryResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            HistoryError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: VersoConfig = toml::from_str(&content).map_err(|e| {
            HistoryError::config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> HistoryResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                HistoryError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> HistoryResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| HistoryError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            HistoryError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
