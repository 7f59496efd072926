use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    ParseError(#[from] serde_json::Error),
}

impl ApiError {
    /// True when the backend answered but rejected the request, as opposed to
    /// a transport failure.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized(_) | ApiError::NotFound(_) | ApiError::Status { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
