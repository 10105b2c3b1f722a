use thiserror::Error;

/// Failures surfaced by the guard backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Backend unreachable, connection reset or request timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be decoded or broke the node schema.
    #[error("invalid response: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return ApiError::Validation(e.to_string());
        }
        if let Some(status) = e.status() {
            return ApiError::Http {
                status: status.as_u16(),
                body: String::new(),
            };
        }
        ApiError::Network(e.to_string())
    }
}
