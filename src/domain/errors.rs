//! Error types shared across the layers.
//!
//! Only `initialize()`/`reinitialize()` of the durable cache surface these to
//! callers; every other public operation logs them and degrades to a no-op.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Root error type for the crate
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    Infrastructure(InfrastructureError),
    Configuration(ConfigurationError),
}

/// Infrastructure layer errors
#[derive(Debug, Clone, PartialEq)]
pub enum InfrastructureError {
    Storage(StorageError),
    Network(NetworkError),
}

/// Durable and key-value storage failures
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    Unavailable(String),
    OpenFailed(String),
    NotInitialized,
    ReadFailed(String),
    WriteFailed(String),
    QuotaExceeded(String),
    Serialization(String),
}

/// Network-related errors
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    HttpRequestFailed(String),
    HttpStatus { status: u16, text: String },
    InvalidResponse(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    InvalidParameter(String),
    MissingConfiguration(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AppError::Infrastructure(e) => write!(f, "Infrastructure Error: {}", e),
            AppError::Configuration(e) => write!(f, "Configuration Error: {}", e),
        }
    }
}

impl Display for InfrastructureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            InfrastructureError::Storage(e) => write!(f, "Storage: {}", e),
            InfrastructureError::Network(e) => write!(f, "Network: {}", e),
        }
    }
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {}", msg),
            StorageError::OpenFailed(msg) => write!(f, "failed to open store: {}", msg),
            StorageError::NotInitialized => write!(f, "store has not been opened"),
            StorageError::ReadFailed(msg) => write!(f, "read failed: {}", msg),
            StorageError::WriteFailed(msg) => write!(f, "write failed: {}", msg),
            StorageError::QuotaExceeded(msg) => write!(f, "quota exceeded: {}", msg),
            StorageError::Serialization(msg) => write!(f, "serialization failed: {}", msg),
        }
    }
}

impl Display for NetworkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            NetworkError::HttpRequestFailed(msg) => write!(f, "HTTP request failed: {}", msg),
            NetworkError::HttpStatus { status, text } => write!(f, "HTTP error: {} - {}", status, text),
            NetworkError::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
        }
    }
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ConfigurationError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            ConfigurationError::MissingConfiguration(msg) => write!(f, "missing configuration: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for InfrastructureError {}
impl std::error::Error for StorageError {}
impl std::error::Error for NetworkError {}
impl std::error::Error for ConfigurationError {}

/// Error conversion utilities
impl From<InfrastructureError> for AppError {
    fn from(error: InfrastructureError) -> Self {
        AppError::Infrastructure(error)
    }
}

impl From<ConfigurationError> for AppError {
    fn from(error: ConfigurationError) -> Self {
        AppError::Configuration(error)
    }
}

impl From<StorageError> for InfrastructureError {
    fn from(error: StorageError) -> Self {
        InfrastructureError::Storage(error)
    }
}

impl From<NetworkError> for InfrastructureError {
    fn from(error: NetworkError) -> Self {
        InfrastructureError::Network(error)
    }
}

impl From<StorageError> for AppError {
    fn from(error: StorageError) -> Self {
        AppError::Infrastructure(error.into())
    }
}

impl From<NetworkError> for AppError {
    fn from(error: NetworkError) -> Self {
        AppError::Infrastructure(error.into())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(error: serde_json::Error) -> Self {
        StorageError::Serialization(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_errors_render_their_layer() {
        let err: AppError = NetworkError::HttpStatus { status: 503, text: "Service Unavailable".into() }.into();
        assert_eq!(
            err.to_string(),
            "Infrastructure Error: Network: HTTP error: 503 - Service Unavailable"
        );
    }
}
