//! Static Cluster Configuration
//!
//! Every tier reads the same file once at start-up:
//!
//! ```text
//! LoadBalancers:
//! 127.0.0.1:8080
//! Nodes:
//! 127.0.0.1:8888, 127.0.0.2:8888
//! Databases:
//! 127.0.0.1:7777
//! 127.0.0.2:7777
//! ```
//!
//! Entries are `host:port`, separated by commas and/or newlines. Sections may be empty
//! but must appear in this order.

use super::types::{Address, Tier};
use crate::error::ConfigError;
use std::path::Path;

const LB_HEADER: &str = "LoadBalancers:";
const NODE_HEADER: &str = "Nodes:";
const DB_HEADER: &str = "Databases:";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterConfig {
    pub load_balancers: Vec<Address>,
    pub nodes: Vec<Address>,
    pub databases: Vec<Address>,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let lb_at = content
            .find(LB_HEADER)
            .ok_or(ConfigError::MissingSection(LB_HEADER))?;
        let node_at = content[lb_at..]
            .find(NODE_HEADER)
            .map(|i| i + lb_at)
            .ok_or(ConfigError::MissingSection(NODE_HEADER))?;
        let db_at = content[node_at..]
            .find(DB_HEADER)
            .map(|i| i + node_at)
            .ok_or(ConfigError::MissingSection(DB_HEADER))?;

        let lb_section = &content[lb_at + LB_HEADER.len()..node_at];
        let node_section = &content[node_at + NODE_HEADER.len()..db_at];
        let db_section = &content[db_at + DB_HEADER.len()..];

        Ok(Self {
            load_balancers: parse_section(lb_section, Tier::LoadBalancer)?,
            nodes: parse_section(node_section, Tier::Node)?,
            databases: parse_section(db_section, Tier::Database)?,
        })
    }

    /// Every configured address, load balancers first.
    pub fn all(&self) -> Vec<Address> {
        self.load_balancers
            .iter()
            .chain(&self.nodes)
            .chain(&self.databases)
            .cloned()
            .collect()
    }
}

fn parse_section(section: &str, tier: Tier) -> Result<Vec<Address>, ConfigError> {
    section
        .split([',', '\n'])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (host, port) = entry
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidEntry(entry.to_string()))?;
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEntry(entry.to_string()))?;
            let host = host.trim();
            if host.is_empty() {
                return Err(ConfigError::InvalidEntry(entry.to_string()));
            }
            Ok(Address::new(tier, host, port))
        })
        .collect()
}
