use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImporterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Fetching {location} failed with status {status}")]
    Fetch { location: String, status: u16 },

    #[error("YAML deserialization failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Source document is malformed: {0}")]
    Parse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ImporterError {
    /// True when a write was rejected by a unique or foreign key constraint.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            ImporterError::Constraint(_) => true,
            ImporterError::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ImporterError>;
