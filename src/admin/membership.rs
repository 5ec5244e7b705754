use crate::cluster::config::ClusterConfig;
use crate::cluster::types::{Address, Tier};

/// Which membership pushes the next propagation pass owes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingPushes {
    /// Active node list must go to every active load balancer.
    pub nodes_to_balancers: bool,
    /// Active shard list must go to every active routing node.
    pub shards_to_nodes: bool,
}

/// Authoritative membership: every configured server plus, per tier, the ones
/// currently answering.
///
/// Invariants: an address only ever sits in the active list of its own tier, never
/// twice; every active address is also known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    known: Vec<Address>,
    active_lb: Vec<Address>,
    active_node: Vec<Address>,
    active_db: Vec<Address>,
    pending: PendingPushes,
}

impl Membership {
    /// Seeds membership from static configuration, assuming every server starts alive.
    pub fn from_config(config: &ClusterConfig) -> Self {
        let mut membership = Self::default();
        for address in config.all() {
            if membership.add_known(address.clone()) {
                membership.active_mut(address.tier).push(address);
            }
        }
        membership
    }

    fn active_mut(&mut self, tier: Tier) -> &mut Vec<Address> {
        match tier {
            Tier::LoadBalancer => &mut self.active_lb,
            Tier::Node => &mut self.active_node,
            Tier::Database => &mut self.active_db,
        }
    }

    pub fn active(&self, tier: Tier) -> &[Address] {
        match tier {
            Tier::LoadBalancer => &self.active_lb,
            Tier::Node => &self.active_node,
            Tier::Database => &self.active_db,
        }
    }

    pub fn known(&self) -> &[Address] {
        &self.known
    }

    pub fn is_known(&self, address: &Address) -> bool {
        self.known.contains(address)
    }

    pub fn is_active(&self, address: &Address) -> bool {
        self.active(address.tier).contains(address)
    }

    /// Adds a known server to its tier's active list. Returns `false` if it was already there.
    pub fn mark_alive(&mut self, address: &Address) -> bool {
        if self.is_active(address) {
            return false;
        }
        self.active_mut(address.tier).push(address.clone());

        match address.tier {
            Tier::LoadBalancer => self.pending.nodes_to_balancers = true,
            Tier::Node => {
                self.pending.nodes_to_balancers = true;
                self.pending.shards_to_nodes = true;
            }
            Tier::Database => self.pending.shards_to_nodes = true,
        }
        true
    }

    /// Drops a server from its tier's active list. Returns `false` if it was not there.
    pub fn mark_down(&mut self, address: &Address) -> bool {
        let active = self.active_mut(address.tier);
        let Some(position) = active.iter().position(|a| a == address) else {
            return false;
        };
        active.remove(position);

        match address.tier {
            Tier::LoadBalancer => {}
            Tier::Node => self.pending.nodes_to_balancers = true,
            Tier::Database => self.pending.shards_to_nodes = true,
        }
        true
    }

    pub fn add_known(&mut self, address: Address) -> bool {
        if self.is_known(&address) {
            return false;
        }
        self.known.push(address);
        true
    }

    /// Forgets a server entirely, including its active entry.
    pub fn remove_known(&mut self, address: &Address) -> bool {
        let Some(position) = self.known.iter().position(|a| a == address) else {
            return false;
        };
        self.known.remove(position);
        self.mark_down(address);
        true
    }

    /// Known servers absent from every active list.
    pub fn unreachable(&self) -> Vec<Address> {
        self.known
            .iter()
            .filter(|address| {
                !self.active_lb.contains(address)
                    && !self.active_node.contains(address)
                    && !self.active_db.contains(address)
            })
            .cloned()
            .collect()
    }

    pub fn take_pending(&mut self) -> PendingPushes {
        std::mem::take(&mut self.pending)
    }
}
