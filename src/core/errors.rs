use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Protobuf decode error: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("API error: {code} - {description}")]
    ApiError { code: String, description: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Token response has no access token: {0}")]
    MissingAccessToken(serde_json::Value),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Connection timeout: {0}")]
    ConnectionTimeout(String),

    #[error("Request timed out after {timeout_ms}ms: {client_msg_id}")]
    Timeout {
        client_msg_id: String,
        timeout_ms: u64,
    },

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Unexpected payload type {actual}, expected {expected}")]
    UnexpectedPayload { expected: u32, actual: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::core::config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        Self::NetworkError(err.to_string())
    }
}
