use super::launcher::Launcher;
use super::membership::Membership;
use crate::cluster::client;
use crate::cluster::config::ClusterConfig;
use crate::cluster::protocol::Request;
use crate::cluster::types::{Address, Tier};
use crate::cluster::validation::is_valid_ip;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinSet;

/// Port each tier listens on when started by a scale request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPorts {
    pub load_balancer: u16,
    pub node: u16,
    pub database: u16,
}

impl Default for TierPorts {
    fn default() -> Self {
        Self {
            load_balancer: 8080,
            node: 8888,
            database: 7777,
        }
    }
}

impl TierPorts {
    pub fn port(&self, tier: Tier) -> u16 {
        match tier {
            Tier::LoadBalancer => self.load_balancer,
            Tier::Node => self.node,
            Tier::Database => self.database,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Pause between monitoring cycles; also how long a cycle waits for slow probes.
    pub monitor_interval: Duration,
    pub ports: TierPorts,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(2),
            ports: TierPorts::default(),
        }
    }
}

impl AdminConfig {
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_ports(mut self, ports: TierPorts) -> Self {
        self.ports = ports;
        self
    }
}

/// Result of an admin scale request, rendered as the text shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleOutcome {
    Added,
    Removed,
    NotRunning,
    AlreadyExists,
    InvalidIp,
    InvalidType,
    InvalidCommand,
}

impl fmt::Display for ScaleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScaleOutcome::Added => "Added",
            ScaleOutcome::Removed => "Removed",
            ScaleOutcome::NotRunning => "Not running",
            ScaleOutcome::AlreadyExists => "Already exists",
            ScaleOutcome::InvalidIp => "Invalid ip address",
            ScaleOutcome::InvalidType => "Invalid type",
            ScaleOutcome::InvalidCommand => "Invalid command",
        })
    }
}

/// What one monitoring cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub came_up: Vec<Address>,
    pub went_down: Vec<Address>,
    pub launched: Vec<Address>,
}

/// The control plane.
///
/// Owns membership, health-checks every known server each cycle, pushes the
/// resulting lists to the tiers that route on them, and relaunches servers that
/// are not answering.
pub struct AdminService {
    config: AdminConfig,
    membership: Mutex<Membership>,
    monitoring: AtomicBool,
    /// Bumped on every start; a loop exits once it no longer owns the current value.
    generation: AtomicU64,
    launcher: Arc<dyn Launcher>,
}

impl AdminService {
    pub fn new(
        config: AdminConfig,
        cluster: &ClusterConfig,
        launcher: Arc<dyn Launcher>,
    ) -> Arc<Self> {
        let membership = Membership::from_config(cluster);
        tracing::info!("Admin managing {} server(s)", membership.known().len());

        Arc::new(Self {
            config,
            membership: Mutex::new(membership),
            monitoring: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            launcher,
        })
    }

    fn membership(&self) -> MutexGuard<'_, Membership> {
        self.membership
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current membership.
    pub fn snapshot(&self) -> Membership {
        self.membership().clone()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::SeqCst)
    }

    /// Enables monitoring. Returns `false` if it was already running.
    pub fn start_monitoring(self: &Arc<Self>) -> bool {
        if self
            .monitoring
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Monitoring started (generation {})", generation);
        let service = self.clone();
        tokio::spawn(async move {
            service.monitor_loop(generation).await;
        });
        true
    }

    /// Disables monitoring; the loop notices at the start of its next cycle.
    pub fn stop_monitoring(&self) {
        if self.monitoring.swap(false, Ordering::SeqCst) {
            tracing::info!("Monitoring stopping");
        }
    }

    fn owns_monitoring(&self, generation: u64) -> bool {
        self.is_monitoring() && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn monitor_loop(self: Arc<Self>, generation: u64) {
        while self.owns_monitoring(generation) {
            let report = self.run_cycle().await;
            if !report.came_up.is_empty() || !report.went_down.is_empty() {
                tracing::info!(
                    "Cycle: {} up, {} down, {} relaunched",
                    report.came_up.len(),
                    report.went_down.len(),
                    report.launched.len()
                );
            }
            tokio::time::sleep(self.config.monitor_interval).await;
        }
        tracing::info!("Monitoring loop {} stopped", generation);
    }

    /// One monitoring cycle: probe everything, propagate changes, relaunch the silent.
    ///
    /// Probes run concurrently. The cycle waits up to one monitor interval for them;
    /// slower probes keep running and apply their result whenever they finish.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let known = self.membership().known().to_vec();
        let report = Arc::new(Mutex::new(CycleReport::default()));

        let mut probes = JoinSet::new();
        for address in known {
            let service = self.clone();
            let report = report.clone();
            probes.spawn(async move {
                let alive = client::probe(&address).await;
                if let Some(up) = service.reclassify(&address, alive) {
                    let mut report = report.lock().unwrap_or_else(|p| p.into_inner());
                    if up {
                        report.came_up.push(address);
                    } else {
                        report.went_down.push(address);
                    }
                }
            });
        }

        let joined = tokio::time::timeout(self.config.monitor_interval, async {
            while probes.join_next().await.is_some() {}
        })
        .await;
        if joined.is_err() {
            tracing::warn!("{} health probe(s) still pending", probes.len());
            probes.detach_all();
        }

        self.propagate().await;
        let launched = self.recover();

        let mut report = report.lock().unwrap_or_else(|p| p.into_inner()).clone();
        report.launched = launched;
        report
    }

    /// Applies one probe result. Returns `Some(true)` if the server came up,
    /// `Some(false)` if it went down, `None` if nothing changed.
    pub fn reclassify(&self, address: &Address, alive: bool) -> Option<bool> {
        let mut membership = self.membership();
        if !membership.is_known(address) {
            return None;
        }

        if alive && membership.mark_alive(address) {
            tracing::info!("{} is alive", address);
            Some(true)
        } else if !alive && membership.mark_down(address) {
            tracing::warn!("{} is not responding", address);
            Some(false)
        } else {
            None
        }
    }

    /// Sends the lists that changed since the last pass to the tiers routing on them.
    pub async fn propagate(&self) {
        let (pending, balancers, nodes, shards) = {
            let mut membership = self.membership();
            (
                membership.take_pending(),
                membership.active(Tier::LoadBalancer).to_vec(),
                membership.active(Tier::Node).to_vec(),
                membership.active(Tier::Database).to_vec(),
            )
        };

        if pending.nodes_to_balancers {
            let payload = Address::encode_list(&nodes);
            for balancer in &balancers {
                push_update(balancer, &payload).await;
            }
        }

        if pending.shards_to_nodes {
            let payload = Address::encode_list(&shards);
            for node in &nodes {
                push_update(node, &payload).await;
            }
        }
    }

    /// Hands every known server that is active nowhere to the launcher.
    pub fn recover(&self) -> Vec<Address> {
        let unreachable = self.membership().unreachable();
        for address in &unreachable {
            self.launcher.launch(address);
        }
        unreachable
    }

    /// Adds or removes a server on operator request.
    ///
    /// Once ip and type are valid the server is launched and asked for STATUS
    /// whatever the code; only `add` looks at the answer.
    pub async fn scale(&self, code: &str, ip: &str, kind: &str) -> ScaleOutcome {
        if !is_valid_ip(ip) {
            return ScaleOutcome::InvalidIp;
        }
        let Some(tier) = Tier::from_scale_type(kind) else {
            return ScaleOutcome::InvalidType;
        };
        let address = Address::new(tier, ip, self.config.ports.port(tier));

        self.launcher.launch(&address);
        let running = match client::exchange(&address, &Request::Status).await {
            Ok(reply) => !reply.body.is_empty(),
            Err(e) => {
                tracing::debug!("Scale status check on {} failed: {}", address, e);
                false
            }
        };

        let outcome = match code {
            "add" if !running => ScaleOutcome::NotRunning,
            "add" => {
                let mut membership = self.membership();
                if membership.add_known(address.clone()) {
                    membership.mark_alive(&address);
                    ScaleOutcome::Added
                } else {
                    ScaleOutcome::AlreadyExists
                }
            }
            "remove" => {
                self.membership().remove_known(&address);
                ScaleOutcome::Removed
            }
            _ => ScaleOutcome::InvalidCommand,
        };

        tracing::info!("Scale {} {}: {}", code, address, outcome);
        if matches!(outcome, ScaleOutcome::Added | ScaleOutcome::Removed) {
            self.propagate().await;
        }
        outcome
    }

    /// Plain-text status view: one line per known server.
    pub fn render_status(&self) -> String {
        let membership = self.membership();
        let mut out = String::from("Servers:\n");
        for address in membership.known() {
            let status = if membership.is_active(address) {
                "Alive"
            } else {
                "No Response"
            };
            out.push_str(&format!(
                "{}:{}  Type: {}  Status: {}\n",
                address.host,
                address.port,
                address.tier.display_name(),
                status
            ));
        }
        out
    }
}

/// Sends UPDATE, retrying once if the peer gave no reply.
async fn push_update(target: &Address, payload: &str) {
    let request = Request::Update {
        payload: payload.to_string(),
    };

    for attempt in 1..=2 {
        match client::exchange(target, &request).await {
            Ok(reply) if !reply.body.is_empty() => {
                tracing::debug!("Pushed membership to {}", target);
                return;
            }
            Ok(_) => tracing::warn!("Empty UPDATE reply from {} (attempt {})", target, attempt),
            Err(e) => tracing::warn!("UPDATE to {} failed (attempt {}): {}", target, attempt, e),
        }
    }
}
