//! Data model shared by the reconciliation components
//!
//! - [`NodeInfo`]: a worker node and its public address
//! - [`IngressSnapshot`]: the parsed, ephemeral view of one ingress
//! - [`DesiredRecord`]: a record computed from ingress and node state
//! - [`RemoteRecord`]: a record as stored by the DNS provider

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// A worker node that DNS records point at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node name as reported by the cluster
    pub name: String,
    /// Public address announced for the node
    pub public_address: IpAddr,
}

impl NodeInfo {
    /// Create a new node entry
    pub fn new(name: impl Into<String>, public_address: IpAddr) -> Self {
        Self {
            name: name.into(),
            public_address,
        }
    }
}

impl fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.public_address)
    }
}

/// Parsed view of an ingress
///
/// Hostnames keep the order of the ingress rules; that order drives the
/// positional pairing done on updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSnapshot {
    /// Cluster-assigned identifier
    pub id: String,
    /// Namespace of the ingress
    pub namespace: String,
    /// Name of the ingress
    pub name: String,
    /// Hostnames exposed by the ingress, in rule order
    pub hostnames: Vec<String>,
}

impl IngressSnapshot {
    /// Create a new snapshot
    pub fn new(
        id: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        hostnames: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            namespace: namespace.into(),
            name: name.into(),
            hostnames,
        }
    }

    /// `namespace/name`, used in log lines and events
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// DNS record type managed by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[default]
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported record type '{}', expected A or AAAA",
                other
            ))),
        }
    }
}

/// A DNS record derived from ingress and node state
///
/// Not yet confirmed to exist remotely. Regenerated on every event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DesiredRecord {
    /// Record type
    pub record_type: RecordType,
    /// Fully qualified hostname
    pub hostname: String,
    /// Address the hostname resolves to
    pub address: IpAddr,
}

impl DesiredRecord {
    /// Record content as the provider stores it
    pub fn content(&self) -> String {
        self.address.to_string()
    }
}

impl fmt::Display for DesiredRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.record_type, self.hostname, self.address)
    }
}

/// A DNS record as stored by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Provider-assigned identifier
    pub id: String,
    /// Record type as reported by the provider (not limited to A/AAAA)
    pub record_type: String,
    /// Record name
    pub name: String,
    /// Record content; the address in string form for A/AAAA records
    pub content: String,
    /// Time-to-live in seconds
    pub ttl: u32,
    /// Whether traffic is proxied by the provider
    pub proxied: bool,
    /// Zone the record belongs to
    pub zone: String,
    /// Last modification time, when reported
    #[serde(default)]
    pub modified_on: Option<DateTime<Utc>>,
}
