//! Error types for the provisioning core.
//!
//! Every validation and consistency failure carries the offending field or
//! entity so callers can surface a specific message. Nothing here is
//! retried; an error aborts the operation that raised it before any
//! document is persisted.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the configuration/secret model and its derivations.
#[derive(Debug, Error)]
pub enum Error {
    /// A field failed its construction-time constraint.
    #[error("invalid {field}: {reason}")]
    Schema {
        /// Name of the offending field.
        field: String,
        /// The constraint that was violated.
        reason: String,
    },

    /// A peer with this name already exists in the config.
    #[error("peer '{0}' already exists")]
    DuplicatePeer(String),

    /// The named peer does not exist in the config.
    #[error("no peer named '{0}' in the config")]
    UnknownPeer(String),

    /// A stored key is not valid base64.
    #[error("{field} failed base64 decoding: {reason}")]
    KeyDecode {
        /// Which key failed to decode.
        field: String,
        /// Decoder error text.
        reason: String,
    },

    /// A stored key decodes to the wrong number of bytes.
    #[error("{field} size is {actual}, expected 32")]
    KeySize {
        /// Which key had the wrong size.
        field: String,
        /// Decoded length in bytes.
        actual: usize,
    },

    /// A private/public key pair does not derive-check.
    #[error("{entity}'s private_key and public_key are not a pair")]
    KeyPairMismatch {
        /// The entity (server or peer) whose pair mismatched.
        entity: String,
    },

    /// Config peers without a matching secret entry. Fatal for export.
    #[error(
        "peers missing secrets: {}. Remove the redundant peers from the config \
         or generate the secrets with `pincer generate-keys --missing`",
        peers.join(", ")
    )]
    MissingSecrets {
        /// The config peers lacking a secret entry.
        peers: Vec<String>,
    },

    /// A destructive operation was requested without force.
    #[error("refusing to {operation} without --force")]
    ForceRequired {
        /// What would have been destroyed.
        operation: String,
    },

    /// A rendered wg-quick value contained a line break.
    #[error("value of {field} contains a line break")]
    NewlineInValue {
        /// The wg-quick field whose value was malformed.
        field: String,
    },

    /// A secret document is readable by group or other.
    #[error(
        "permissions {mode:03o} for '{}' are too open; 600 is recommended",
        path.display()
    )]
    InsecurePermissions {
        /// Path of the offending file.
        path: PathBuf,
        /// Its permission bits.
        mode: u32,
    },

    /// A document path exists but is not a regular file.
    #[error("'{}' is not a file", .0.display())]
    NotAFile(PathBuf),

    /// Key service or key material failure.
    #[error(transparent)]
    Key(#[from] pincer_keys::KeyError),

    /// Filesystem failure while reading or writing a document.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Config document (YAML) parse or encode failure.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Secret document (JSON) parse or encode failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Creates a schema error for `field`.
    pub(crate) fn schema(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
