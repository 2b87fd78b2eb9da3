use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Collection not found: {0}")]
    NoSuchCollection(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("timeout after {0} ms")]
    Timeout(u64),

    #[error("Row conversion error: {0}")]
    Conversion(String),
}

impl From<std::io::Error> for DbError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
