//! CLI-level errors.

use thiserror::Error;

/// Errors surfaced by the `pincer` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// A core model or document operation failed.
    #[error(transparent)]
    Core(#[from] pincer_core::Error),

    /// A command-line value could not be parsed.
    #[error("invalid {field}: {reason}")]
    InvalidArgument {
        /// The flag that carried the bad value.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The address allocator found no free host address.
    #[error(
        "no free host address left in the configured subnets; \
         pass --addresses explicitly or widen the interface subnets"
    )]
    AddressPoolExhausted,
}
