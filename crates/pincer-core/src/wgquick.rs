//! Projection of a provisioned interface into `wg-quick` INI text.
//!
//! The same INI shape is produced from two points of view: the server's
//! (one `[Peer]` block per configured client) and a single client's (one
//! `[Peer]` block for the server). Both refuse to render when the secret
//! store fails its consistency check.

use std::net::IpAddr;

use ipnet::IpNet;

use pincer_keys::KeyService;

use crate::error::{Error, Result};
use crate::provision::Provision;
use crate::secret::StoredKey;
use crate::types::{Endpoint, FwMark, Keepalive};

/// The `[Interface]` section of a wg-quick config.
#[derive(Clone, Debug)]
pub struct WgQuickInterface {
    /// `PrivateKey` of the rendered side.
    pub private_key: StoredKey,
    /// `ListenPort`.
    pub listen_port: Option<u16>,
    /// `FwMark`.
    pub fw_mark: Option<FwMark>,
    /// `Address` lines.
    pub address: Vec<IpNet>,
    /// `DNS` lines.
    pub dns: Vec<IpAddr>,
    /// `MTU`.
    pub mtu: Option<u16>,
    /// `Table`.
    pub table: Option<String>,
    /// `PreUp` lines.
    pub pre_up: Vec<String>,
    /// `PostUp` lines.
    pub post_up: Vec<String>,
    /// `PreDown` lines.
    pub pre_down: Vec<String>,
    /// `PostDown` lines.
    pub post_down: Vec<String>,
    /// `SaveConfig`.
    pub save_config: Option<bool>,
}

impl WgQuickInterface {
    fn ini_lines(&self, lines: &mut Vec<String>) -> Result<()> {
        lines.push("[Interface]".to_string());
        push_field(lines, "PrivateKey", self.private_key.expose())?;
        if let Some(port) = self.listen_port {
            push_field(lines, "ListenPort", &port.to_string())?;
        }
        if let Some(mark) = &self.fw_mark {
            push_field(lines, "FwMark", &mark.to_string())?;
        }
        for address in &self.address {
            push_field(lines, "Address", &address.to_string())?;
        }
        for server in &self.dns {
            push_field(lines, "DNS", &server.to_string())?;
        }
        if let Some(mtu) = self.mtu {
            push_field(lines, "MTU", &mtu.to_string())?;
        }
        if let Some(table) = &self.table {
            push_field(lines, "Table", table)?;
        }
        for command in &self.pre_up {
            push_field(lines, "PreUp", command)?;
        }
        for command in &self.post_up {
            push_field(lines, "PostUp", command)?;
        }
        for command in &self.pre_down {
            push_field(lines, "PreDown", command)?;
        }
        for command in &self.post_down {
            push_field(lines, "PostDown", command)?;
        }
        if let Some(save) = self.save_config {
            push_field(lines, "SaveConfig", if save { "true" } else { "false" })?;
        }
        Ok(())
    }
}

/// One `[Peer]` section of a wg-quick config.
#[derive(Clone, Debug)]
pub struct WgQuickPeer {
    /// Optional `# <name>` comment above the section body.
    pub comment: Option<String>,
    /// `PublicKey` of the remote side.
    pub public_key: String,
    /// `PresharedKey` shared by both sides.
    pub preshared_key: Option<StoredKey>,
    /// `AllowedIPs` lines.
    pub allowed_ips: Vec<IpNet>,
    /// `Endpoint`.
    pub endpoint: Option<Endpoint>,
    /// `PersistentKeepalive`.
    pub persistent_keepalive: Option<Keepalive>,
}

impl WgQuickPeer {
    fn ini_lines(&self, lines: &mut Vec<String>) -> Result<()> {
        lines.push("[Peer]".to_string());
        if let Some(comment) = &self.comment {
            if comment.contains('\n') || comment.contains('\r') {
                return Err(Error::NewlineInValue {
                    field: "comment".to_string(),
                });
            }
            lines.push(format!("# {comment}"));
        }
        push_field(lines, "PublicKey", &self.public_key)?;
        if let Some(preshared) = &self.preshared_key {
            push_field(lines, "PresharedKey", preshared.expose())?;
        }
        for allowed in &self.allowed_ips {
            push_field(lines, "AllowedIPs", &allowed.to_string())?;
        }
        if let Some(endpoint) = &self.endpoint {
            push_field(lines, "Endpoint", endpoint.as_str())?;
        }
        if let Some(keepalive) = &self.persistent_keepalive {
            push_field(lines, "PersistentKeepalive", &keepalive.to_string())?;
        }
        Ok(())
    }
}

/// A complete wg-quick configuration ready to be formatted.
#[derive(Clone, Debug)]
pub struct WgQuickConfig {
    /// The `[Interface]` section.
    pub interface: WgQuickInterface,
    /// The `[Peer]` sections in order.
    pub peers: Vec<WgQuickPeer>,
}

impl WgQuickConfig {
    /// Formats the config as INI text.
    ///
    /// Sections are separated by one blank line; the text carries no
    /// trailing newline.
    ///
    /// # Errors
    ///
    /// [`Error::NewlineInValue`] if any rendered value embeds a line
    /// break, which would corrupt the INI structure.
    pub fn format_ini(&self) -> Result<String> {
        let mut lines = Vec::new();
        self.interface.ini_lines(&mut lines)?;
        for peer in &self.peers {
            lines.push(String::new());
            peer.ini_lines(&mut lines)?;
        }
        Ok(lines.join("\n"))
    }
}

fn push_field(lines: &mut Vec<String>, name: &str, value: &str) -> Result<()> {
    if value.contains('\n') || value.contains('\r') {
        return Err(Error::NewlineInValue {
            field: name.to_string(),
        });
    }
    lines.push(format!("{name} = {value}"));
    Ok(())
}

impl Provision {
    /// Projects the model from the server's point of view.
    ///
    /// # Errors
    ///
    /// Fails if [`Provision::check_secret`] fails; nothing is rendered in
    /// that case.
    pub fn server_wg_quick(&self, service: &dyn KeyService) -> Result<WgQuickConfig> {
        self.check_secret(service)?;
        let config = &self.config;
        let interface = WgQuickInterface {
            private_key: self.secret.private_key.clone(),
            listen_port: Some(config.listen_port),
            fw_mark: config.fw_mark,
            address: config.addresses.clone(),
            dns: config.dns_addresses.clone(),
            mtu: config.mtu,
            table: config.table.clone(),
            pre_up: config.pre_up.clone(),
            post_up: config.post_up.clone(),
            pre_down: config.pre_down.clone(),
            post_down: config.post_down.clone(),
            save_config: None,
        };
        let mut peers = Vec::with_capacity(config.peers.len());
        for (name, peer) in config.peers.iter() {
            let peer_secret = self
                .secret
                .peers
                .get(name)
                .ok_or_else(|| Error::MissingSecrets {
                    peers: vec![name.to_string()],
                })?;
            peers.push(WgQuickPeer {
                comment: Some(name.to_string()),
                public_key: peer_secret.public_key.expose().to_string(),
                preshared_key: peer_secret.preshared_key.clone(),
                allowed_ips: peer.server_allowed_ips.clone(),
                endpoint: peer.server_endpoint.clone(),
                persistent_keepalive: peer.server_persistent_keepalive,
            });
        }
        Ok(WgQuickConfig { interface, peers })
    }

    /// Projects the model from the named peer's point of view.
    ///
    /// The endpoint resolves to the peer's own `client_endpoint` when set,
    /// falling back to the interface's `default_endpoint`.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownPeer`] for an unconfigured name, or a failing
    /// [`Provision::check_secret`].
    pub fn client_wg_quick(
        &self,
        service: &dyn KeyService,
        peer_name: &str,
    ) -> Result<WgQuickConfig> {
        self.check_secret(service)?;
        let peer = self
            .config
            .peers
            .get(peer_name)
            .ok_or_else(|| Error::UnknownPeer(peer_name.to_string()))?;
        let peer_secret = self
            .secret
            .peers
            .get(peer_name)
            .ok_or_else(|| Error::MissingSecrets {
                peers: vec![peer_name.to_string()],
            })?;
        let interface = WgQuickInterface {
            private_key: peer_secret.private_key.clone(),
            listen_port: peer.listen_port,
            fw_mark: peer.fw_mark,
            address: peer.addresses.clone(),
            dns: peer.dns_addresses.clone(),
            mtu: peer.mtu,
            table: peer.table.clone(),
            pre_up: peer.pre_up.clone(),
            post_up: peer.post_up.clone(),
            pre_down: peer.pre_down.clone(),
            post_down: peer.post_down.clone(),
            save_config: None,
        };
        let server_peer = WgQuickPeer {
            comment: None,
            public_key: self.secret.public_key.expose().to_string(),
            preshared_key: peer_secret.preshared_key.clone(),
            allowed_ips: peer.client_allowed_ips.clone(),
            endpoint: Some(
                peer.client_endpoint
                    .clone()
                    .unwrap_or_else(|| self.config.default_endpoint.clone()),
            ),
            persistent_keepalive: peer.client_persistent_keepalive,
        };
        Ok(WgQuickConfig {
            interface,
            peers: vec![server_peer],
        })
    }
}
