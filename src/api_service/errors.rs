use std::collections::HashMap;

use serde_json::Value;

/// Errors returned directly to the caller of `ApiService`
///
/// These are raised before any network I/O happens: invalid call sites,
/// bad configuration, or a storage backend that cannot be reached.
#[derive(Debug, thiserror::Error)]
pub enum ApiServiceError {
    #[error("url is not defined correctly")]
    MissingUrl,
    #[error("API call method is not defined correctly: {0:?}")]
    InvalidMethod(String),
    #[error("callback object not defined")]
    MissingCallback,
    #[error("'on_success' callback not defined")]
    MissingSuccessHandler,
    #[error("'on_fail' callback not defined")]
    MissingFailHandler,
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Broad category of a failed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestErrorKind {
    /// The server answered with a non-2xx status
    Status,
    /// Connection could not be established or was interrupted
    Network,
    /// The pass-through timeout elapsed
    Timeout,
    /// The request could not be built (bad header name, bad url, ...)
    InvalidRequest,
    /// A token could not be read from storage
    Storage,
}

/// Response embedded in a failed request, when the server answered at all
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub data: Value,
}

/// A failed request, as handed to `on_fail`
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub kind: RequestErrorKind,
    pub message: String,
    pub response: Option<ErrorResponse>,
}

impl RequestError {
    pub fn new(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            response: None,
        }
    }

    pub(crate) fn from_response(response: ErrorResponse) -> Self {
        Self {
            kind: RequestErrorKind::Status,
            message: format!("Request failed with status code {}", response.status),
            response: Some(response),
        }
    }

    /// Status of the embedded response, if any
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RequestErrorKind::Timeout
        } else if err.is_builder() {
            RequestErrorKind::InvalidRequest
        } else {
            RequestErrorKind::Network
        };
        Self::new(kind, err.to_string())
    }
}

impl From<ApiServiceError> for RequestError {
    fn from(err: ApiServiceError) -> Self {
        match err {
            ApiServiceError::Storage(_) | ApiServiceError::Io(_) | ApiServiceError::Json(_) => {
                Self::new(RequestErrorKind::Storage, err.to_string())
            }
            other => Self::new(RequestErrorKind::InvalidRequest, other.to_string()),
        }
    }
}
