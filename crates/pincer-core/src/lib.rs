//! WireGuard provisioning core for Pincer.
//!
//! This crate owns the configuration/secret data model for one server
//! interface and its peers, and everything derived from it: field
//! validation, address allocation, key-pair consistency checking, firewall
//! rule derivation, and projection into `wg-quick` INI text. It performs no
//! networking and touches no live device; its only side effects are
//! whole-document rewrites of the two files it manages.

pub mod config;
pub mod document;
pub mod error;
pub mod firewall;
pub mod provision;
pub mod secret;
pub mod types;
pub mod wgquick;

pub use config::{InterfaceConfig, PeerConfig, PeerMap};
pub use error::{Error, Result};
pub use provision::{GenerateKeys, Provision};
pub use secret::{check_key, check_key_pair, PeerSecret, ServerSecret, StoredKey};
pub use types::{Endpoint, FwMark, Keepalive};
pub use wgquick::{WgQuickConfig, WgQuickInterface, WgQuickPeer};
