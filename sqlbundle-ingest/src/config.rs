//! TOML ingestion configuration.
//!
//! Every field has a default except `source.database`. A minimal file:
//!
//! ```toml
//! [source]
//! database = "data/stock.db"
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlbundle_core::calendar::SHSZ;
use sqlbundle_core::data::SourceSchema;
use sqlbundle_core::normalize::LowPolicy;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestConfig {
    /// Symbols to ingest. Empty means every symbol in the source's symbol table.
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Normalize symbols on the rayon pool.
    #[serde(default)]
    pub parallel: bool,

    #[serde(default)]
    pub bundle: BundleSection,

    pub source: SourceSection,

    #[serde(default)]
    pub calendar: CalendarSection,

    #[serde(default)]
    pub normalize: NormalizeSection,

    #[serde(default)]
    pub cache: CacheSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BundleSection {
    pub name: String,
    pub output_dir: PathBuf,
    /// Exchange recorded on every asset row.
    pub exchange: String,
}

impl Default for BundleSection {
    fn default() -> Self {
        Self {
            name: "sqlitedb".into(),
            output_dir: PathBuf::from("bundles"),
            exchange: "sqlitedb".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSection {
    pub database: PathBuf,
    #[serde(default)]
    pub schema: SourceSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CalendarSection {
    /// Calendar the sessions come from.
    pub name: String,
    /// Extra name the bundle records its calendar under.
    pub alias: Option<String>,
    /// Weekdays on which the exchange is closed.
    pub holidays: Vec<NaiveDate>,
}

impl Default for CalendarSection {
    fn default() -> Self {
        Self {
            name: SHSZ.into(),
            alias: Some("SQLITEDB".into()),
            holidays: Vec::new(),
        }
    }
}

impl CalendarSection {
    /// Name the bundle is registered against: the alias when one is set.
    pub fn bundle_calendar(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizeSection {
    pub low_policy: LowPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    /// Persist raw bars as Parquet here; unset keeps the cache in memory.
    pub dir: Option<PathBuf>,
}

impl IngestConfig {
    /// Config for `database` with every other field defaulted.
    pub fn for_database(database: impl Into<PathBuf>) -> Self {
        Self {
            symbols: Vec::new(),
            parallel: false,
            bundle: BundleSection::default(),
            source: SourceSection {
                database: database.into(),
                schema: SourceSchema::default(),
            },
            calendar: CalendarSection::default(),
            normalize: NormalizeSection::default(),
            cache: CacheSection::default(),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = &self.bundle.name;
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "bundle name '{name}' must be a plain directory name"
            )));
        }
        if self.bundle.exchange.is_empty() {
            return Err(ConfigError::Invalid("bundle exchange is empty".into()));
        }
        if self.source.database.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("source.database is empty".into()));
        }
        self.source
            .schema
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.calendar.name.is_empty() {
            return Err(ConfigError::Invalid("calendar name is empty".into()));
        }
        if self.calendar.alias.as_deref() == Some(self.calendar.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "calendar alias '{}' equals the calendar name",
                self.calendar.name
            )));
        }
        if let Some(blank) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank symbol {blank:?}")));
        }
        Ok(())
    }
}
