pub type RelayResult<T> = Result<T, RelayError>;

/// Errors raised by the messaging engine.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A required field is missing or empty; rejected before touching storage.
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// A stored record could not be decoded.
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl RelayError {
    pub fn is_validation(&self) -> bool {
        matches!(self, RelayError::Validation(_))
    }
}

impl From<uuid::Error> for RelayError {
    fn from(err: uuid::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<time::error::ComponentRange> for RelayError {
    fn from(err: time::error::ComponentRange) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
