//! Error types for WireGuard key operations.

use thiserror::Error;

/// Errors that can occur during WireGuard key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Invalid base64 encoding.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(String),

    /// Invalid key length.
    #[error("invalid key length: expected 32, got {0}")]
    InvalidKeyLength(usize),

    /// The key service failed to produce a key.
    #[error("key service failure: {0}")]
    ServiceFailure(String),
}
