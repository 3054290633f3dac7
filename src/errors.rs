use thiserror::Error;

/// Every failure a restore invocation can end with.
///
/// Configuration and store errors are raised before any database session is
/// opened. Statement-level database errors never reach this type; they are
/// tallied and skipped inside the executor.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("AWS error during restoration: {0}")]
    Store(String),

    #[error("Database error during restoration: {0}")]
    Database(String),

    #[error("Unexpected error during restoration: {0}")]
    Unexpected(String),
}

impl RestoreError {
    /// Short class name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            RestoreError::Configuration(_) => "configuration",
            RestoreError::Store(_) => "store",
            RestoreError::Database(_) => "database",
            RestoreError::Unexpected(_) => "unexpected",
        }
    }
}

impl From<std::io::Error> for RestoreError {
    fn from(err: std::io::Error) -> Self {
        RestoreError::Unexpected(err.to_string())
    }
}

impl From<sqlx::Error> for RestoreError {
    fn from(err: sqlx::Error) -> Self {
        RestoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RestoreError {
    fn from(err: serde_json::Error) -> Self {
        RestoreError::Store(format!("malformed secret payload: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;
