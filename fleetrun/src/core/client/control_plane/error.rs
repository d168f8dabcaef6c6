use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ControlPlaneError {
    /// Transport failure, the request may or may not have reached the control plane
    #[error("Network error during {operation}: {source}")]
    NetworkError {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The control plane answered with a non-success status
    #[error("Control plane error during {operation} (status {status}): {message}")]
    ApiError { operation: &'static str, status: StatusCode, message: String },

    #[error("Failed to parse response during {operation}: {message}")]
    ParseError { operation: &'static str, message: String },

    #[error("Response to {operation} carries no {header} header")]
    MissingRequestId { operation: &'static str, header: &'static str },

    #[error("Unrecognized {kind} reported by control plane: {value}")]
    UnrecognizedState { kind: &'static str, value: String },

    #[error("Failed to build URL: {0}")]
    UrlError(String),
}

impl ControlPlaneError {
    pub fn network(operation: &'static str, source: reqwest::Error) -> Self {
        Self::NetworkError { operation, source }
    }

    pub fn parse_error(operation: &'static str, message: impl Into<String>) -> Self {
        Self::ParseError { operation, message: message.into() }
    }

    pub fn unrecognized(kind: &'static str, value: impl Into<String>) -> Self {
        Self::UnrecognizedState { kind, value: value.into() }
    }
}
