use serde::{Deserialize, Serialize};
use std::fmt;

/// The server tiers a control plane can monitor.
///
/// Each tier has its own wire tag (first reply line) and alive marker (STATUS body),
/// so a health probe can tell a load balancer apart from a node or a shard answering
/// on an unexpected port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    LoadBalancer,
    Node,
    Database,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::LoadBalancer, Tier::Node, Tier::Database];

    /// Tag written as the first line of every reply from this tier.
    pub fn tag(self) -> &'static str {
        match self {
            Tier::LoadBalancer => "LB",
            Tier::Node => "NODE",
            Tier::Database => "DB",
        }
    }

    /// Body of a STATUS reply from a live server of this tier.
    pub fn alive_marker(self) -> &'static str {
        match self {
            Tier::LoadBalancer => "LBALIVE",
            Tier::Node => "NODEALIVE",
            Tier::Database => "DBALIVE",
        }
    }

    /// Human-readable name used in the admin status view.
    pub fn display_name(self) -> &'static str {
        match self {
            Tier::LoadBalancer => "Load Balancer",
            Tier::Node => "URL Shortener",
            Tier::Database => "Database",
        }
    }

    /// Parses the `type` parameter of an admin scale request (`LB`, `Node`, `DB`).
    pub fn from_scale_type(value: &str) -> Option<Self> {
        match value {
            "LB" => Some(Tier::LoadBalancer),
            "Node" => Some(Tier::Node),
            "DB" => Some(Tier::Database),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Identity of one server: its tier plus where it listens.
///
/// Plain value type; membership sets compare addresses structurally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Address {
    pub tier: Tier,
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(tier: Tier, host: impl Into<String>, port: u16) -> Self {
        Self {
            tier,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Encodes a list as the UPDATE payload: `host/port` entries joined by commas.
    pub fn encode_list(addresses: &[Address]) -> String {
        addresses
            .iter()
            .map(|a| format!("{}/{}", a.host, a.port))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Decodes an UPDATE payload, tagging every entry with `tier`.
    ///
    /// Returns `None` if any entry is not `host/port`. An empty payload is an empty list.
    pub fn decode_list(payload: &str, tier: Tier) -> Option<Vec<Address>> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Some(Vec::new());
        }

        payload
            .split(',')
            .map(|entry| {
                let (host, port) = entry.trim().split_once('/')?;
                let port = port.trim().parse().ok()?;
                if host.is_empty() {
                    return None;
                }
                Some(Address::new(tier, host.trim(), port))
            })
            .collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.tier, self.host, self.port)
    }
}
