//! Service client error types.

/// Errors from any of the backend service clients.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        /// First 500 characters of the body, when there was one
        body: Option<String>,
    },

    /// Service answered with an unexpected error status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The entity does not exist (any more)
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The service rejected the input. `message` is the service's own text.
    #[error("{message}")]
    Validation { message: String },

    /// Credentials rejected or action forbidden
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },
}

/// How a failure should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input. Shown to the acting user verbatim; no state change.
    Validation,
    /// Entity vanished. Drives lifecycle clearing; never shown as a failure.
    NotFound,
    /// Network trouble or a server fault. Logged; state is kept and the next
    /// poll retries.
    Transient,
    /// The acting role may not do this.
    Authorization,
}

impl ServiceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ServiceError::Validation { .. } => ErrorClass::Validation,
            ServiceError::NotFound { .. } => ErrorClass::NotFound,
            ServiceError::Unauthorized { .. } => ErrorClass::Authorization,
            ServiceError::Http(_) | ServiceError::Json { .. } | ServiceError::Api { .. } => {
                ErrorClass::Transient
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.class() == ErrorClass::NotFound
    }

    /// Build the error for a non-success status.
    ///
    /// `message` is the `message` field of the service's error envelope when
    /// it had one, otherwise the raw body.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 | 422 => ServiceError::Validation { message },
            401 | 403 => ServiceError::Unauthorized { message },
            404 => ServiceError::NotFound { message },
            _ => ServiceError::Api { status, message },
        }
    }
}
