//! The key generation service boundary.
//!
//! All key material flows through [`KeyService`] so that callers never care
//! whether keys come from an in-process CSPRNG, an external `wg(1)` binary,
//! or a test double. A failing service call is fatal to the operation that
//! made it; there is no retry.

use crate::error::KeyError;
use crate::keys::{PresharedKey, PrivateKey, PublicKey, KEY_SIZE};

/// Capability to generate and derive WireGuard key material.
pub trait KeyService {
    /// Generates a fresh private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key source fails.
    fn generate_private_key(&self) -> Result<PrivateKey, KeyError>;

    /// Derives the public key corresponding to `private`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key source fails.
    fn derive_public_key(&self, private: &PrivateKey) -> Result<PublicKey, KeyError>;

    /// Generates a fresh preshared key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying key source fails.
    fn generate_preshared_key(&self) -> Result<PresharedKey, KeyError>;
}

/// In-process key service backed by x25519-dalek and the OS CSPRNG.
///
/// Uses `OsRng` directly instead of `thread_rng()` because cryptographic
/// key material should come directly from the operating system's CSPRNG
/// rather than a userspace PRNG that is merely seeded from system entropy.
#[derive(Debug, Clone, Copy, Default)]
pub struct X25519KeyService;

impl KeyService for X25519KeyService {
    fn generate_private_key(&self) -> Result<PrivateKey, KeyError> {
        let secret = x25519_dalek::StaticSecret::random_from_rng(rand_core::OsRng);
        Ok(PrivateKey::from_bytes_array(secret.to_bytes()))
    }

    fn derive_public_key(&self, private: &PrivateKey) -> Result<PublicKey, KeyError> {
        Ok(private.public_key())
    }

    fn generate_preshared_key(&self) -> Result<PresharedKey, KeyError> {
        use rand::RngCore;
        let mut key = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut key);
        Ok(PresharedKey::from_bytes_array(key))
    }
}

/// Deterministic key service for tests.
///
/// Hands out private keys from an incrementing seed, so key material is
/// reproducible across runs while derived pairs remain cryptographically
/// consistent.
#[derive(Debug, Default)]
pub struct SequentialKeyService {
    counter: std::cell::Cell<u8>,
}

impl SequentialKeyService {
    /// Creates a service whose first key is seeded with `start`.
    #[must_use]
    pub fn starting_at(start: u8) -> Self {
        Self {
            counter: std::cell::Cell::new(start),
        }
    }

    fn next_seed(&self) -> [u8; KEY_SIZE] {
        let n = self.counter.get();
        self.counter.set(n.wrapping_add(1));
        [n; KEY_SIZE]
    }
}

impl KeyService for SequentialKeyService {
    fn generate_private_key(&self) -> Result<PrivateKey, KeyError> {
        Ok(PrivateKey::from_bytes_array(self.next_seed()))
    }

    fn derive_public_key(&self, private: &PrivateKey) -> Result<PublicKey, KeyError> {
        Ok(private.public_key())
    }

    fn generate_preshared_key(&self) -> Result<PresharedKey, KeyError> {
        Ok(PresharedKey::from_bytes_array(self.next_seed()))
    }
}
