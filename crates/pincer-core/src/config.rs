//! The interface/peer configuration model.
//!
//! An [`InterfaceConfig`] is the typed, validated view of one interface's
//! YAML document. The raw document is retained alongside the typed view so
//! that persisting an unmodified config reproduces the operator's file
//! instead of regenerating it, and mutations are merged into the raw
//! document as minimal patches.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::types::{validate_interface_name, validate_peer_name, Endpoint, FwMark, Keepalive};

/// Per-peer overrides and policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    /// Optional client-side listen port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    /// Optional client-side firewall mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_mark: Option<FwMark>,
    /// Addresses assigned to the client's tunnel interface.
    pub addresses: Vec<IpNet>,
    /// Optional client-side DNS servers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_addresses: Vec<IpAddr>,
    /// Optional client-side MTU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    /// Optional client-side routing table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Client-side commands run before the interface comes up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_up: Vec<String>,
    /// Client-side commands run after the interface comes up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_up: Vec<String>,
    /// Client-side commands run before the interface goes down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_down: Vec<String>,
    /// Client-side commands run after the interface goes down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_down: Vec<String>,
    /// IP ranges this peer may originate from, as seen by the server.
    pub server_allowed_ips: Vec<IpNet>,
    /// Optional endpoint the server uses to reach this peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_endpoint: Option<Endpoint>,
    /// Server-side keepalive towards this peer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_persistent_keepalive: Option<Keepalive>,
    /// IP ranges the client routes through the tunnel.
    pub client_allowed_ips: Vec<IpNet>,
    /// Optional endpoint override for this client; defaults to the
    /// interface's `default_endpoint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_endpoint: Option<Endpoint>,
    /// Client-side keepalive towards the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_persistent_keepalive: Option<Keepalive>,
}

impl PeerConfig {
    /// Creates a peer config from its required address lists.
    ///
    /// # Errors
    ///
    /// Returns a schema error if any of the lists is empty.
    pub fn new(
        addresses: Vec<IpNet>,
        server_allowed_ips: Vec<IpNet>,
        client_allowed_ips: Vec<IpNet>,
    ) -> Result<Self> {
        let peer = Self {
            listen_port: None,
            fw_mark: None,
            addresses,
            dns_addresses: Vec::new(),
            mtu: None,
            table: None,
            pre_up: Vec::new(),
            post_up: Vec::new(),
            pre_down: Vec::new(),
            post_down: Vec::new(),
            server_allowed_ips,
            server_endpoint: None,
            server_persistent_keepalive: None,
            client_allowed_ips,
            client_endpoint: None,
            client_persistent_keepalive: None,
        };
        peer.validate()?;
        Ok(peer)
    }

    /// Sets the client-side keepalive.
    #[must_use]
    pub fn with_client_persistent_keepalive(mut self, keepalive: Keepalive) -> Self {
        self.client_persistent_keepalive = Some(keepalive);
        self
    }

    /// Sets the server-side keepalive.
    #[must_use]
    pub fn with_server_persistent_keepalive(mut self, keepalive: Keepalive) -> Self {
        self.server_persistent_keepalive = Some(keepalive);
        self
    }

    /// Sets the client-side endpoint override.
    #[must_use]
    pub fn with_client_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.client_endpoint = Some(endpoint);
        self
    }

    /// Checks the per-field constraints.
    ///
    /// # Errors
    ///
    /// Returns a schema error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.validate_at("")
    }

    fn validate_at(&self, prefix: &str) -> Result<()> {
        let field = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };
        if self.addresses.is_empty() {
            return Err(Error::schema(
                field("addresses"),
                "must contain at least one address",
            ));
        }
        if self.server_allowed_ips.is_empty() {
            return Err(Error::schema(
                field("server_allowed_ips"),
                "must contain at least one address",
            ));
        }
        if self.client_allowed_ips.is_empty() {
            return Err(Error::schema(
                field("client_allowed_ips"),
                "must contain at least one address",
            ));
        }
        Ok(())
    }
}

/// An insertion-ordered peer-name → [`PeerConfig`] map.
///
/// Preserves the document order of the backing YAML and rejects duplicate
/// names at parse time.
#[derive(Clone, Debug, Default)]
pub struct PeerMap {
    entries: Vec<(String, PeerConfig)>,
}

impl PeerMap {
    /// Looks a peer up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PeerConfig> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, peer)| peer)
    }

    /// Returns true if a peer with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Iterates peers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PeerConfig)> {
        self.entries.iter().map(|(n, p)| (n.as_str(), p))
    }

    /// Iterates peer names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Number of peers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no peers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, name: String, peer: PeerConfig) {
        self.entries.push((name, peer));
    }
}

impl Serialize for PeerMap {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, peer) in &self.entries {
            map.serialize_entry(name, peer)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PeerMap {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PeerMapVisitor;

        impl<'de> Visitor<'de> for PeerMapVisitor {
            type Value = PeerMap;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a map of peer name to peer config")
            }

            fn visit_map<M>(self, mut access: M) -> std::result::Result<PeerMap, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut peers = PeerMap::default();
                while let Some((name, peer)) = access.next_entry::<String, PeerConfig>()? {
                    if peers.contains(&name) {
                        return Err(de::Error::custom(format!("duplicate peer name '{name}'")));
                    }
                    peers.push(name, peer);
                }
                Ok(peers)
            }
        }

        deserializer.deserialize_map(PeerMapVisitor)
    }
}

/// One WireGuard server interface: its own settings plus its peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InterfaceConfig {
    /// Interface name (1-15 characters, kernel charset).
    pub name: String,
    /// UDP port the server listens on.
    pub listen_port: u16,
    /// Optional firewall mark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fw_mark: Option<FwMark>,
    /// Addresses assigned to the server's tunnel interface.
    pub addresses: Vec<IpNet>,
    /// Optional DNS servers pushed to the server interface.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_addresses: Vec<IpAddr>,
    /// Optional MTU.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u16>,
    /// Optional routing table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Commands run before the interface comes up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_up: Vec<String>,
    /// Commands run after the interface comes up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_up: Vec<String>,
    /// Commands run before the interface goes down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_down: Vec<String>,
    /// Commands run after the interface goes down.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_down: Vec<String>,
    /// Endpoint clients use to reach this server unless overridden.
    pub default_endpoint: Endpoint,
    /// Configured peers in document order.
    #[serde(default, skip_serializing_if = "PeerMap::is_empty")]
    pub peers: PeerMap,
    /// The raw document this config was loaded from, if any.
    #[serde(skip)]
    raw: Option<serde_yaml::Value>,
}

impl InterfaceConfig {
    /// Creates a fresh interface config with no peers.
    ///
    /// # Errors
    ///
    /// Returns a schema error if the name or address list violates its
    /// constraint.
    pub fn new(
        name: impl Into<String>,
        listen_port: u16,
        addresses: Vec<IpNet>,
        default_endpoint: Endpoint,
    ) -> Result<Self> {
        let config = Self {
            name: name.into(),
            listen_port,
            fw_mark: None,
            addresses,
            dns_addresses: Vec::new(),
            mtu: None,
            table: None,
            pre_up: Vec::new(),
            post_up: Vec::new(),
            pre_down: Vec::new(),
            post_down: Vec::new(),
            default_endpoint,
            peers: PeerMap::default(),
            raw: None,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the post-up command list.
    #[must_use]
    pub fn with_post_up(mut self, commands: Vec<String>) -> Self {
        self.post_up = commands;
        self
    }

    /// Sets the pre-down command list.
    #[must_use]
    pub fn with_pre_down(mut self, commands: Vec<String>) -> Self {
        self.pre_down = commands;
        self
    }

    /// Parses and validates a config from YAML text, retaining the raw
    /// document for round-tripping.
    ///
    /// # Errors
    ///
    /// Returns a YAML error for malformed documents and a schema error for
    /// constraint violations.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(text)?;
        let mut config: Self = serde_yaml::from_value(raw.clone())?;
        config.validate()?;
        config.raw = Some(raw);
        Ok(config)
    }

    /// Serializes the config back to YAML.
    ///
    /// When the config was loaded from a document, the retained raw
    /// document is emitted so untouched fields survive verbatim; a config
    /// built in memory is serialized from the typed view.
    ///
    /// # Errors
    ///
    /// Returns a YAML error if encoding fails.
    pub fn to_yaml_string(&self) -> Result<String> {
        match &self.raw {
            Some(raw) => Ok(serde_yaml::to_string(raw)?),
            None => Ok(serde_yaml::to_string(self)?),
        }
    }

    /// Checks all field constraints, including every peer's.
    ///
    /// # Errors
    ///
    /// Returns a schema error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        validate_interface_name(&self.name)?;
        if self.addresses.is_empty() {
            return Err(Error::schema(
                "addresses",
                "must contain at least one address",
            ));
        }
        for (name, peer) in self.peers.iter() {
            validate_peer_name(name)
                .map_err(|_| Error::schema("peers", format!("invalid peer name '{name}'")))?;
            peer.validate_at(&format!("peers.{name}"))?;
        }
        Ok(())
    }

    /// Adds a peer, merging it into the retained raw document.
    ///
    /// Unrelated content of the raw document is left untouched so manual
    /// edits survive the rewrite.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicatePeer`] if the name is taken, or a schema
    /// error if the name or peer config is invalid.
    pub fn add_peer(&mut self, name: &str, peer: PeerConfig) -> Result<()> {
        validate_peer_name(name)?;
        peer.validate()?;
        if self.peers.contains(name) {
            return Err(Error::DuplicatePeer(name.to_string()));
        }
        if let Some(serde_yaml::Value::Mapping(doc)) = &mut self.raw {
            let entry = doc
                .entry(serde_yaml::Value::from("peers"))
                .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
            if let serde_yaml::Value::Mapping(peers) = entry {
                peers.insert(serde_yaml::Value::from(name), serde_yaml::to_value(&peer)?);
            }
        }
        self.peers.push(name.to_string(), peer);
        Ok(())
    }

    /// Finds the next unused host address in the configured subnets.
    ///
    /// Used addresses are the interface's own plus every peer's. Subnets
    /// are scanned in declared order, hosts ascending, with network and
    /// broadcast addresses excluded. Returns `None` when every subnet is
    /// exhausted; callers surface that as an allocation failure.
    #[must_use]
    pub fn find_next_available_address(&self) -> Option<IpAddr> {
        let used: HashSet<IpAddr> = self
            .addresses
            .iter()
            .map(IpNet::addr)
            .chain(
                self.peers
                    .iter()
                    .flat_map(|(_, peer)| peer.addresses.iter().map(IpNet::addr)),
            )
            .collect();
        self.addresses
            .iter()
            .flat_map(IpNet::hosts)
            .find(|host| !used.contains(host))
    }
}
