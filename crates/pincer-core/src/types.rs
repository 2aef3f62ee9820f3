//! Domain scalar types shared by the config model and the renderer.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Interface names are limited to 15 bytes by the kernel (IFNAMSIZ).
static INTERFACE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_=+.-]{1,15}$").unwrap_or_else(|_| unreachable!()));

static PEER_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_=+.-]+$").unwrap_or_else(|_| unreachable!()));

static ENDPOINT_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.+:\d+$").unwrap_or_else(|_| unreachable!()));

/// Validates a WireGuard interface name.
///
/// # Errors
///
/// Returns a schema error if the name is empty, longer than 15 characters,
/// or contains characters outside `A-Za-z0-9_=+.-`.
pub fn validate_interface_name(name: &str) -> Result<()> {
    if INTERFACE_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(Error::schema(
            "name",
            "must be 1-15 characters from A-Za-z0-9_=+.-",
        ))
    }
}

/// Validates a peer name.
///
/// # Errors
///
/// Returns a schema error if the name is empty or contains characters
/// outside `A-Za-z0-9_=+.-`.
pub fn validate_peer_name(name: &str) -> Result<()> {
    if PEER_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(Error::schema(
            "peer name",
            "must be non-empty characters from A-Za-z0-9_=+.-",
        ))
    }
}

/// A peer endpoint in `host:port` form.
///
/// The host part may be a DNS name, so this is deliberately looser than
/// `SocketAddr`; only the trailing numeric port is enforced.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint(String);

impl Endpoint {
    /// Returns the endpoint text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if ENDPOINT_REGEX.is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::schema("endpoint", "must match host:port"))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Endpoint {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// An `FwMark` setting: either the literal `off` or a mark value.
///
/// `wg-quick` accepts `off` to explicitly clear an inherited mark, so the
/// sentinel is a first-class variant rather than an absent value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FwMark {
    /// The literal `off`.
    Off,
    /// A numeric firewall mark.
    Mark(u32),
}

impl fmt::Display for FwMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Mark(mark) => write!(f, "{mark}"),
        }
    }
}

impl Serialize for FwMark {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Off => serializer.serialize_str("off"),
            Self::Mark(mark) => serializer.serialize_u32(*mark),
        }
    }
}

impl<'de> Deserialize<'de> for FwMark {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct FwMarkVisitor;

        impl Visitor<'_> for FwMarkVisitor {
            type Value = FwMark;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"off\" or an integer mark")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<FwMark, E> {
                if v == "off" {
                    Ok(FwMark::Off)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<FwMark, E> {
                u32::try_from(v)
                    .map(FwMark::Mark)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<FwMark, E> {
                u32::try_from(v)
                    .map(FwMark::Mark)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(FwMarkVisitor)
    }
}

/// A `PersistentKeepalive` setting: the literal `off` or an interval in
/// seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keepalive {
    /// The literal `off`.
    Off,
    /// Keepalive interval in seconds.
    Secs(u16),
}

impl fmt::Display for Keepalive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Secs(secs) => write!(f, "{secs}"),
        }
    }
}

impl Serialize for Keepalive {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Off => serializer.serialize_str("off"),
            Self::Secs(secs) => serializer.serialize_u16(*secs),
        }
    }
}

impl<'de> Deserialize<'de> for Keepalive {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KeepaliveVisitor;

        impl Visitor<'_> for KeepaliveVisitor {
            type Value = Keepalive;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("\"off\" or an interval in seconds")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Keepalive, E> {
                if v == "off" {
                    Ok(Keepalive::Off)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Keepalive, E> {
                u16::try_from(v)
                    .map(Keepalive::Secs)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Keepalive, E> {
                u16::try_from(v)
                    .map(Keepalive::Secs)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }
        }

        deserializer.deserialize_any(KeepaliveVisitor)
    }
}
