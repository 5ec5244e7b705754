use crate::cluster::types::{Address, Tier};
use std::process::Stdio;

/// Starts (or restarts) the server process for an address.
///
/// Fire-and-forget: success is only ever observed by a later STATUS probe.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, address: &Address);
}

/// Logs launch requests without starting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLauncher;

impl Launcher for NoopLauncher {
    fn launch(&self, address: &Address) {
        tracing::info!("Would launch {} (no launcher configured)", address);
    }
}

/// Runs a shell command template, detached.
///
/// `{host}`, `{port}` and `{tier}` are substituted; `{tier}` becomes the
/// subcommand name (`lb`, `node`, `db`). Example:
///
/// ```text
/// ssh {host} 'nohup url-shortener {tier} --bind 0.0.0.0:{port} >/dev/null 2>&1 &'
/// ```
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    template: String,
}

impl CommandLauncher {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn command_for(&self, address: &Address) -> String {
        self.template
            .replace("{host}", &address.host)
            .replace("{port}", &address.port.to_string())
            .replace("{tier}", subcommand(address.tier))
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, address: &Address) {
        let command = self.command_for(address);
        tracing::info!("Recovering {}: {}", address, command);

        let spawned = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        if let Err(e) = spawned {
            tracing::error!("Failed to launch {}: {}", address, e);
        }
    }
}

fn subcommand(tier: Tier) -> &'static str {
    match tier {
        Tier::LoadBalancer => "lb",
        Tier::Node => "node",
        Tier::Database => "db",
    }
}
