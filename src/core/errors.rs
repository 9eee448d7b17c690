//! BD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::PathBuf;

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, BdError>;

/// Top-level error type for the Birddog client.
///
/// The service-facing taxonomy is deliberately flat: transport failure,
/// non-success status, and malformed payload are all caught at the call
/// site and surfaced to the user; nothing retries automatically.
#[derive(Debug, Error)]
pub enum BdError {
    #[error("[BD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[BD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[BD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[BD-2001] transport failure for {endpoint}: {details}")]
    Transport { endpoint: String, details: String },

    #[error("[BD-2002] service returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("[BD-2003] malformed response from {endpoint}: {details}")]
    MalformedResponse { endpoint: String, details: String },

    #[error("[BD-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[BD-3001] not logged in: the service rejected the session")]
    NotLoggedIn,

    #[error("[BD-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[BD-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[BD-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl BdError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "BD-1001",
            Self::MissingConfig { .. } => "BD-1002",
            Self::ConfigParse { .. } => "BD-1003",
            Self::Transport { .. } => "BD-2001",
            Self::Status { .. } => "BD-2002",
            Self::MalformedResponse { .. } => "BD-2003",
            Self::Serialization { .. } => "BD-2101",
            Self::NotLoggedIn => "BD-3001",
            Self::Io { .. } => "BD-3002",
            Self::ChannelClosed { .. } => "BD-3003",
            Self::Runtime { .. } => "BD-3900",
        }
    }

    /// Whether the failure originated in the service API layer.
    #[must_use]
    pub const fn is_service_error(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Status { .. } | Self::MalformedResponse { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for BdError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for BdError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
