//! Error types for the relay server.

use skirmish_shared::protocol::{ErrorKind, PlayerId};
use thiserror::Error;

/// Invalid server configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// Registry invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection identifiers are unique, so this indicates an allocator bug.
    #[error("player {0} is already registered")]
    DuplicateId(PlayerId),
}

/// Inbound frame rejected at the transport boundary.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("message of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("malformed payload: binary frames are not accepted")]
    Binary,
}

impl ProtocolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::TooLarge { .. } => ErrorKind::MessageTooLarge,
            ProtocolError::Malformed(_) | ProtocolError::Binary => ErrorKind::MalformedPayload,
        }
    }
}
