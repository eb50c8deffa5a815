//! Error types for route53-ddns.

use crate::route53::ChangeAction;
use thiserror::Error;

/// Result type alias for route53-ddns.
pub type Result<T> = std::result::Result<T, DdnsError>;

/// DDNS error types.
#[derive(Error, Debug)]
pub enum DdnsError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Public IP lookup failed or returned something unusable.
    #[error("Network error: {0}")]
    Network(String),

    /// No hosted zone matches the domain.
    #[error("Could not find hosted zone for {domain}")]
    ZoneNotFound { domain: String },

    /// A change batch was rejected by Route 53.
    #[error("{action} of {domain} failed with HTTP {status}: {message}")]
    ProviderChange {
        action: ChangeAction,
        domain: String,
        status: u16,
        message: String,
    },

    /// Route 53 could not be reached or answered with an error.
    #[error("Route 53 {operation} failed: {message}")]
    ProviderApi {
        operation: &'static str,
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DdnsError {
    pub(crate) fn api(operation: &'static str, message: impl Into<String>) -> Self {
        DdnsError::ProviderApi {
            operation,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for DdnsError {
    fn from(e: reqwest::Error) -> Self {
        DdnsError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for DdnsError {
    fn from(e: toml::de::Error) -> Self {
        DdnsError::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for DdnsError {
    fn from(e: toml::ser::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DdnsError {
    fn from(e: serde_json::Error) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}

impl From<quick_xml::DeError> for DdnsError {
    fn from(e: quick_xml::DeError) -> Self {
        DdnsError::Serialization(e.to_string())
    }
}
