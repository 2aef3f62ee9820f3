//! WireGuard key material for Pincer.
//!
//! This crate provides the Curve25519 key types used by the provisioning
//! core, plus the [`KeyService`] boundary through which all key generation
//! and public-key derivation flows.

pub mod error;
mod keys;
mod service;

pub use error::KeyError;
pub use keys::{PresharedKey, PrivateKey, PublicKey, KEY_SIZE};
pub use service::{KeyService, SequentialKeyService, X25519KeyService};
