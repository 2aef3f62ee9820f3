//! A provisioned interface: one config document paired with one secret
//! document, and the operations that keep the two consistent.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use pincer_keys::KeyService;

use crate::config::{InterfaceConfig, PeerConfig};
use crate::document;
use crate::error::{Error, Result};
use crate::secret::ServerSecret;

/// What `generate_keys` should (re)generate.
///
/// Destructive combinations require `force`; the caller resolves that
/// decision up front (a flag, never a prompt).
#[derive(Clone, Debug, Default)]
pub struct GenerateKeys {
    /// Regenerate the whole secret: server pair and every peer.
    pub all: bool,
    /// Regenerate the server's own key pair.
    pub server: bool,
    /// Generate entries for config peers that lack one.
    pub missing: bool,
    /// Regenerate these named peers.
    pub peers: Vec<String>,
    /// Pre-resolved confirmation for destructive regeneration.
    pub force: bool,
}

/// One interface's config and secret, handled as a unit.
#[derive(Clone, Debug)]
pub struct Provision {
    /// The interface configuration.
    pub config: InterfaceConfig,
    /// The matching secret store.
    pub secret: ServerSecret,
}

impl Provision {
    /// Pairs a config with its secret.
    #[must_use]
    pub fn new(config: InterfaceConfig, secret: ServerSecret) -> Self {
        Self { config, secret }
    }

    /// Loads both documents for `interface` from `dir`.
    ///
    /// The secret file's permissions are checked before it is read.
    ///
    /// # Errors
    ///
    /// I/O, parse, schema, or permission errors from either document.
    pub fn load(dir: &Path, interface: &str) -> Result<Self> {
        let config_file = document::config_path(dir, interface);
        let config = InterfaceConfig::from_yaml_str(&fs::read_to_string(&config_file)?)?;
        let secret_file = document::secret_path(dir, interface);
        document::check_file_mode(&secret_file)?;
        let secret = ServerSecret::from_json_str(&fs::read_to_string(&secret_file)?)?;
        Ok(Self { config, secret })
    }

    /// Writes both documents for a newly initialized interface.
    ///
    /// # Errors
    ///
    /// [`Error::ForceRequired`] if either document already exists and
    /// `force` is false; the config is written first and a secret failure
    /// leaves the config on disk (detectable via [`Self::check_secret`]).
    pub fn store_new(&self, dir: &Path, interface: &str, force: bool) -> Result<()> {
        self.write_config(dir, interface, force)?;
        self.write_secret(dir, interface, force)
    }

    /// Rewrites both documents in place.
    ///
    /// # Errors
    ///
    /// I/O or encoding errors from either document.
    pub fn store(&self, dir: &Path, interface: &str) -> Result<()> {
        self.write_config(dir, interface, true)?;
        self.write_secret(dir, interface, true)
    }

    /// Rewrites only the secret document.
    ///
    /// # Errors
    ///
    /// I/O or encoding errors.
    pub fn store_secret(&self, dir: &Path, interface: &str) -> Result<()> {
        self.write_secret(dir, interface, true)
    }

    fn write_config(&self, dir: &Path, interface: &str, overwrite: bool) -> Result<()> {
        let path = document::config_path(dir, interface);
        info!(path = %path.display(), "writing config");
        document::write_document(&path, &self.config.to_yaml_string()?, overwrite)
    }

    fn write_secret(&self, dir: &Path, interface: &str, overwrite: bool) -> Result<()> {
        let path = document::secret_path(dir, interface);
        info!(path = %path.display(), "writing secret");
        document::write_document(&path, &self.secret.to_json_string()?, overwrite)
    }

    /// Checks that the secret store can back every config peer and that
    /// all key material is valid.
    ///
    /// Config peers without a secret entry are fatal; secret entries
    /// without a config peer are only warned about (they are never
    /// auto-pruned).
    ///
    /// # Errors
    ///
    /// [`Error::MissingSecrets`] naming the uncovered peers, or the first
    /// failing key check.
    pub fn check_secret(&self, service: &dyn KeyService) -> Result<()> {
        let missing: Vec<String> = self
            .config
            .peers
            .names()
            .filter(|name| !self.secret.peers.contains_key(*name))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingSecrets { peers: missing });
        }
        let redundant: Vec<&str> = self
            .secret
            .peers
            .keys()
            .filter(|name| !self.config.peers.contains(name))
            .map(String::as_str)
            .collect();
        if !redundant.is_empty() {
            warn!(peers = ?redundant, "redundant peers in the secret store");
        }
        self.secret.check(service)
    }

    /// Adds a peer to the config and generates its secret in one
    /// operation, so the two stores never diverge permanently.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicatePeer`], a schema error, or a key-service failure.
    /// A key-service failure after the config mutation leaves the
    /// in-memory pair unpersisted.
    pub fn add_peer(&mut self, service: &dyn KeyService, name: &str, peer: PeerConfig) -> Result<()> {
        self.config.add_peer(name, peer)?;
        self.secret.generate_peer(service, name)?;
        Ok(())
    }

    /// Generates or regenerates key material per `request`.
    ///
    /// Returns the names of previously missing peers that were filled in
    /// (only populated by `missing`).
    ///
    /// # Errors
    ///
    /// [`Error::ForceRequired`] for destructive scopes without `force`,
    /// or a key-service failure.
    pub fn generate_keys(
        &mut self,
        service: &dyn KeyService,
        request: &GenerateKeys,
    ) -> Result<Vec<String>> {
        if request.all {
            if !request.force {
                return Err(Error::ForceRequired {
                    operation: "regenerate every key".to_string(),
                });
            }
            self.secret.regenerate_server(service)?;
            self.secret.peers.clear();
            let names: Vec<String> = self.config.peers.names().map(String::from).collect();
            for name in names {
                self.secret.generate_peer(service, &name)?;
            }
            return Ok(Vec::new());
        }
        if request.server {
            if !request.force {
                return Err(Error::ForceRequired {
                    operation: "regenerate the server secret".to_string(),
                });
            }
            self.secret.regenerate_server(service)?;
        }
        for name in &request.peers {
            if !request.force && self.secret.peers.contains_key(name) {
                return Err(Error::ForceRequired {
                    operation: format!("regenerate the secret for peer '{name}'"),
                });
            }
            self.secret.generate_peer(service, name)?;
        }
        let mut filled = Vec::new();
        if request.missing {
            let names: Vec<String> = self
                .config
                .peers
                .names()
                .filter(|name| !self.secret.peers.contains_key(*name))
                .map(String::from)
                .collect();
            for name in names {
                self.secret.generate_peer(service, &name)?;
                filled.push(name);
            }
        }
        Ok(filled)
    }
}
