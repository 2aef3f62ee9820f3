//! The secret store: server and per-peer key material.
//!
//! Keys are held as the base64 text found in the secret document and only
//! decoded when checked, so a malformed entry surfaces as a specific
//! decode/size error naming the key rather than a load failure.

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use pincer_keys::{KeyService, PrivateKey, KEY_SIZE};

use crate::error::{Error, Result};

/// A base64-encoded key as stored in the secret document.
///
/// Debug output is redacted; use [`StoredKey::expose`] to read the text.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredKey(String);

impl StoredKey {
    /// Wraps raw base64 text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the base64 text.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for StoredKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoredKey([REDACTED])")
    }
}

impl From<pincer_keys::PrivateKey> for StoredKey {
    fn from(key: pincer_keys::PrivateKey) -> Self {
        Self(key.to_base64())
    }
}

impl From<pincer_keys::PublicKey> for StoredKey {
    fn from(key: pincer_keys::PublicKey) -> Self {
        Self(key.to_base64())
    }
}

impl From<pincer_keys::PresharedKey> for StoredKey {
    fn from(key: pincer_keys::PresharedKey) -> Self {
        Self(key.to_base64())
    }
}

/// Decodes a stored key, failing with an error that names `field`.
///
/// # Errors
///
/// [`Error::KeyDecode`] if the text is not base64, [`Error::KeySize`] if
/// the payload is not exactly 32 bytes.
pub fn check_key(field: &str, key: &StoredKey) -> Result<[u8; KEY_SIZE]> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(key.expose())
        .map_err(|e| Error::KeyDecode {
            field: field.to_string(),
            reason: e.to_string(),
        })?;
    if bytes.len() != KEY_SIZE {
        return Err(Error::KeySize {
            field: field.to_string(),
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; KEY_SIZE];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Checks that a stored private/public pair actually belongs together.
///
/// Both keys are validated individually, then the public key is re-derived
/// from the private key and compared in constant time.
///
/// # Errors
///
/// Decode/size errors from [`check_key`], [`Error::KeyPairMismatch`] when
/// the derived public key disagrees, or a key-service failure.
pub fn check_key_pair(
    service: &dyn KeyService,
    entity: &str,
    private: &StoredKey,
    public: &StoredKey,
) -> Result<()> {
    let private_bytes = check_key(&format!("{entity} private_key"), private)?;
    let public_bytes = check_key(&format!("{entity} public_key"), public)?;
    let derived = service.derive_public_key(&PrivateKey::from_bytes_array(private_bytes))?;
    if bool::from(derived.as_bytes().ct_eq(&public_bytes)) {
        Ok(())
    } else {
        Err(Error::KeyPairMismatch {
            entity: entity.to_string(),
        })
    }
}

/// Key material for one peer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerSecret {
    /// The peer's private key.
    pub private_key: StoredKey,
    /// The peer's public key.
    pub public_key: StoredKey,
    /// Optional preshared key for this peer's session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preshared_key: Option<StoredKey>,
}

impl PeerSecret {
    /// Generates a full peer secret (key pair plus preshared key).
    ///
    /// # Errors
    ///
    /// Returns an error if the key service fails.
    pub fn generate(service: &dyn KeyService) -> Result<Self> {
        let private = service.generate_private_key()?;
        let public = service.derive_public_key(&private)?;
        let preshared = service.generate_preshared_key()?;
        Ok(Self {
            private_key: private.into(),
            public_key: public.into(),
            preshared_key: Some(preshared.into()),
        })
    }

    /// Validates this peer's key material.
    ///
    /// # Errors
    ///
    /// Returns the first failing key check.
    pub fn check(&self, service: &dyn KeyService, name: &str) -> Result<()> {
        check_key_pair(
            service,
            &format!("peer {name}"),
            &self.private_key,
            &self.public_key,
        )?;
        if let Some(preshared) = &self.preshared_key {
            check_key(&format!("peer {name} preshared_key"), preshared)?;
        }
        Ok(())
    }
}

/// The interface's own key pair plus all peer secrets.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSecret {
    /// The server's private key.
    pub private_key: StoredKey,
    /// The server's public key.
    pub public_key: StoredKey,
    /// Peer secrets by peer name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub peers: BTreeMap<String, PeerSecret>,
}

impl ServerSecret {
    /// Generates a fresh server secret with no peers.
    ///
    /// # Errors
    ///
    /// Returns an error if the key service fails.
    pub fn generate(service: &dyn KeyService) -> Result<Self> {
        let private = service.generate_private_key()?;
        let public = service.derive_public_key(&private)?;
        Ok(Self {
            private_key: private.into(),
            public_key: public.into(),
            peers: BTreeMap::new(),
        })
    }

    /// Replaces the server's own key pair, leaving peer secrets alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the key service fails.
    pub fn regenerate_server(&mut self, service: &dyn KeyService) -> Result<()> {
        let private = service.generate_private_key()?;
        let public = service.derive_public_key(&private)?;
        self.private_key = private.into();
        self.public_key = public.into();
        Ok(())
    }

    /// Generates (or replaces) the secret entry for `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key service fails.
    pub fn generate_peer(&mut self, service: &dyn KeyService, name: &str) -> Result<()> {
        let secret = PeerSecret::generate(service)?;
        self.peers.insert(name.to_string(), secret);
        Ok(())
    }

    /// Validates every key and key pair in the store, server first.
    ///
    /// # Errors
    ///
    /// Returns the first failing key check.
    pub fn check(&self, service: &dyn KeyService) -> Result<()> {
        check_key_pair(service, "server", &self.private_key, &self.public_key)?;
        for (name, peer) in &self.peers {
            peer.check(service, name)?;
        }
        Ok(())
    }

    /// Parses a secret from JSON text.
    ///
    /// # Errors
    ///
    /// Returns a JSON error for malformed documents.
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the secret to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if encoding fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pincer_keys::SequentialKeyService;

    fn svc() -> SequentialKeyService {
        SequentialKeyService::starting_at(1)
    }

    #[test]
    fn generated_secret_checks_clean() {
        let service = svc();
        let mut secret = ServerSecret::generate(&service).expect("generate");
        secret.generate_peer(&service, "client_0").expect("peer");
        secret.check(&service).expect("consistent");
    }

    #[test]
    fn check_key_rejects_bad_base64() {
        let err = check_key("server private_key", &StoredKey::new("@@not-base64@@"))
            .expect_err("must fail");
        match err {
            Error::KeyDecode { field, .. } => assert_eq!(field, "server private_key"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn check_key_rejects_short_payload() {
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 31]);
        let err = check_key("peer a public_key", &StoredKey::new(short)).expect_err("must fail");
        match err {
            Error::KeySize { field, actual } => {
                assert_eq!(field, "peer a public_key");
                assert_eq!(actual, 31);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn mismatched_pair_is_detected() {
        let service = svc();
        let a = ServerSecret::generate(&service).expect("a");
        let b = ServerSecret::generate(&service).expect("b");
        let err = check_key_pair(&service, "server", &a.private_key, &b.public_key)
            .expect_err("must fail");
        assert!(matches!(err, Error::KeyPairMismatch { entity } if entity == "server"));
    }

    #[test]
    fn flipping_a_byte_breaks_the_pair() {
        let service = svc();
        let secret = ServerSecret::generate(&service).expect("generate");
        let mut bytes = check_key("server public_key", &secret.public_key).expect("decode");
        bytes[0] ^= 0x01;
        let tampered =
            StoredKey::new(base64::engine::general_purpose::STANDARD.encode(bytes));
        let err = check_key_pair(&service, "server", &secret.private_key, &tampered)
            .expect_err("must fail");
        assert!(matches!(err, Error::KeyPairMismatch { .. }));
    }

    #[test]
    fn json_round_trip() {
        let service = svc();
        let mut secret = ServerSecret::generate(&service).expect("generate");
        secret.generate_peer(&service, "client_0").expect("peer");
        let text = secret.to_json_string().expect("encode");
        let reloaded = ServerSecret::from_json_str(&text).expect("decode");
        assert_eq!(
            reloaded.private_key.expose(),
            secret.private_key.expose()
        );
        assert!(reloaded.peers.contains_key("client_0"));
    }

    #[test]
    fn stored_key_debug_redacts() {
        let key = StoredKey::new("c2VjcmV0IG1hdGVyaWFsCg==");
        assert!(!format!("{key:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = ServerSecret::from_json_str(
            r#"{"private_key":"x","public_key":"y","extra":1}"#,
        );
        assert!(err.is_err());
    }
}
