use serde::Deserialize;

use crate::attribute::KeyPolicy;
use crate::error::Result;

/// Where the backing SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

/// Runtime settings, read from an optional file and `CATALOGUE_*` environment
/// variables, the latter taking precedence.
///
/// ```toml
/// database = "events.sqlite"
/// case_insensitive_keys = false
/// enforce_interval = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path of the database file, in-memory when absent or `:memory:`.
    pub database: Option<String>,
    /// Accept upper case letters in attribute keys.
    pub case_insensitive_keys: bool,
    /// Refuse to save events whose end lies before their start.
    pub enforce_interval: bool,
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Settings> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::with_name(path));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix("CATALOGUE").try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match self.database.as_deref() {
            None | Some(":memory:") => PersistenceMode::InMemory,
            Some(path) => PersistenceMode::File(path.to_string()),
        }
    }
    pub fn key_policy(&self) -> KeyPolicy {
        if self.case_insensitive_keys {
            KeyPolicy::CaseInsensitive
        } else {
            KeyPolicy::Strict
        }
    }
}
