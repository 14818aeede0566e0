//! Shared types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown for an address family the server does not have
pub const NO_IPV4: &str = "IPv4";
pub const NO_IPV6: &str = "IPv6";
/// Shown when neither address family is present
pub const NO_ADDRESS: &str = "IPvX";
/// Shown when the inventory carries no location
pub const UNKNOWN_REGION: &str = "REGION";
/// Latency of a server that has never answered a probe
pub const UNKNOWN_LATENCY: &str = "PING";

/// Stable server identifier assigned by the inventory service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Address family of a server address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Inventory view of a server, as produced by the inventory service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    pub id: ServerId,
    pub name: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
    /// Lifecycle state, free-form ("running", "stopped", ...)
    pub state: String,
    /// Region/zone label, `None` when the service reports no location
    pub region: Option<String>,
}

impl ServerInfo {
    /// Create a server with no addresses and no location
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id: ServerId::new(id),
            name: name.into(),
            ipv4: None,
            ipv6: None,
            state: state.into(),
            region: None,
        }
    }

    pub fn with_ipv4(mut self, address: impl Into<String>) -> Self {
        self.ipv4 = Some(address.into());
        self
    }

    pub fn with_ipv6(mut self, address: impl Into<String>) -> Self {
        self.ipv6 = Some(address.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Address to probe: IPv4 when present, otherwise IPv6
    pub fn probe_address(&self) -> Option<(AddressFamily, &str)> {
        match (&self.ipv4, &self.ipv6) {
            (Some(v4), _) => Some((AddressFamily::V4, v4.as_str())),
            (None, Some(v6)) => Some((AddressFamily::V6, v6.as_str())),
            (None, None) => None,
        }
    }

    pub fn region_label(&self) -> &str {
        self.region.as_deref().unwrap_or(UNKNOWN_REGION)
    }
}

/// Locally measured health, owned by the prober
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub reachable: bool,
    /// Whole milliseconds of the last successful probe, or [`UNKNOWN_LATENCY`]
    pub latency: String,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            reachable: false,
            latency: UNKNOWN_LATENCY.to_string(),
        }
    }
}

impl Health {
    /// Apply a probe result.
    ///
    /// Returns `false` (and leaves the value untouched) when the result carries
    /// no news: same reachability, and either unreachable or same latency. An
    /// unreachable result keeps the last known latency.
    pub fn apply(&mut self, reachable: bool, latency: &str) -> bool {
        if self.reachable == reachable && (!reachable || self.latency == latency) {
            return false;
        }
        self.reachable = reachable;
        if reachable {
            self.latency = latency.to_string();
        }
        true
    }
}

/// One tracked server: inventory attributes plus health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub info: ServerInfo,
    pub health: Health,
}

impl ServerRecord {
    pub fn id(&self) -> &ServerId {
        &self.info.id
    }
}
