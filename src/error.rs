use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogueError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid attribute key '{key}'")]
    InvalidKey { key: String },
    #[error("Unknown field '{field}' on {kind}")]
    UnknownField { field: String, kind: &'static str },
    #[error("Type mismatch on '{operand}': expected {expected}, found {found}")]
    TypeMismatch {
        operand: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Unsupported operand type: {0}")]
    UnsupportedOperandType(String),
    #[error("{0} needs at least one predicate")]
    EmptyCombinator(&'static str),
    #[error("Value of '{operand}' cannot be stored: {message}")]
    InvalidValue { operand: String, message: String },
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
    #[error("Corrupt row: {message}")]
    CorruptRow { message: String },
    #[error("Only events and catalogues can be saved, got {0}")]
    UnsupportedEntity(String),
    #[error("Ambiguous base: {0}")]
    AmbiguousBase(String),
    #[error("{0} has not been saved")]
    NotPersisted(String),
    #[error("Catalogue '{catalogue}' is computed from a predicate, its membership cannot be edited")]
    ComputedMembership { catalogue: String },
    #[error("Event {uuid} ends before it starts")]
    InvalidInterval { uuid: String },
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, CatalogueError>;

// Helper conversions
impl From<::config::ConfigError> for CatalogueError {
    fn from(e: ::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl CatalogueError {
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Self::CorruptRow {
            message: message.into(),
        }
    }
}
