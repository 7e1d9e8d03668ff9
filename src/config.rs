//! Reload and backend configuration.

use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::GraphLoadError;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DELETE_BATCH_SIZE: usize = 10_000;

/// How float values render when a statement is written out inline.
///
/// `QuotedFloats` emits floats as quoted strings for backends that mis-parse
/// native float literals. Which backends need it is a per-deployment decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericLiteralMode {
    #[default]
    Native,
    QuotedFloats,
}

/// Options for one reload run.
///
/// ```rust
/// use graphload::ReloadConfig;
/// let config = ReloadConfig::default();
/// assert_eq!(config.batch_size, 100);
/// assert!(config.index_natural_keys);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Operations per transaction. Each transaction is committed once it holds
    /// this many operations.
    pub batch_size: usize,

    /// Literal style used for inline statement previews.
    pub numeric_literals: NumericLiteralMode,

    /// Create one lookup index per node kind on its natural key before relations load.
    pub index_natural_keys: bool,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            numeric_literals: NumericLiteralMode::default(),
            index_natural_keys: true,
        }
    }
}

impl ReloadConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, GraphLoadError> {
        let config: ReloadConfig =
            serde_json::from_str(json).map_err(|e| GraphLoadError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, GraphLoadError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| GraphLoadError::config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), GraphLoadError> {
        if self.batch_size == 0 {
            return Err(GraphLoadError::config("batch_size must be at least 1"));
        }
        Ok(())
    }
}

/// Options for the SQLite graph backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,

    /// Rows removed per delete statement while clearing the graph.
    pub delete_batch_size: usize,

    /// Prepared statement cache capacity.
    pub cache_size: Option<usize>,

    /// PRAGMA name to value, applied right after opening.
    pub pragma_settings: HashMap<String, String>,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            delete_batch_size: DEFAULT_DELETE_BATCH_SIZE,
            cache_size: None,
            pragma_settings: HashMap::new(),
        }
    }
}

impl SqliteConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), GraphLoadError> {
        if self.delete_batch_size == 0 {
            return Err(GraphLoadError::config(
                "delete_batch_size must be at least 1",
            ));
        }
        for name in self.pragma_settings.keys() {
            if !crate::statement::is_identifier(name) {
                return Err(GraphLoadError::config(format!(
                    "invalid pragma name {name:?}"
                )));
            }
        }
        Ok(())
    }
}
