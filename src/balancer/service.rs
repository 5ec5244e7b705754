use super::cache::UrlCache;
use super::selector::NodeSelector;
use crate::cluster::client;
use crate::cluster::protocol::{ACK_UPDATED, HttpResponse, Reply, Request, read_request_raw};
use crate::cluster::server::ConnectionHandler;
use crate::cluster::types::{Address, Tier};

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

const FAVICON: &str = "favicon.ico";

#[derive(Debug, Clone)]
pub struct BalancerConfig {
    /// Nodes tried per request before giving up.
    pub connect_attempts: usize,
    pub cache_capacity: usize,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    /// Largest request or response relayed, in bytes.
    pub max_message: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            cache_capacity: 50,
            cache_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
            max_message: 8192,
        }
    }
}

impl BalancerConfig {
    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache_capacity = capacity;
        self.cache_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_connect_attempts(mut self, attempts: usize) -> Self {
        self.connect_attempts = attempts.max(1);
        self
    }
}

/// Client-facing load balancer.
///
/// Spreads requests round-robin over the routing nodes and answers repeated reads
/// from its cache. Node selection and the cache sit behind separate locks, so a
/// sweep never holds up routing.
pub struct LoadBalancer {
    config: BalancerConfig,
    selector: NodeSelector,
    cache: Mutex<UrlCache>,
}

impl LoadBalancer {
    pub fn new(config: BalancerConfig, nodes: Vec<Address>) -> Arc<Self> {
        tracing::info!("Load balancer starting with {} node(s)", nodes.len());
        let cache = UrlCache::new(config.cache_capacity, config.cache_ttl);
        Arc::new(Self {
            config,
            selector: NodeSelector::new(nodes),
            cache: Mutex::new(cache),
        })
    }

    pub fn selector(&self) -> &NodeSelector {
        &self.selector
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, UrlCache> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn cached(&self, short: &str) -> Option<String> {
        self.cache().get(short)
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn remember(&self, short: &str, long: &str) {
        self.cache().insert(short, long);
    }

    pub fn sweep(&self) -> usize {
        let removed = self.cache().sweep();
        if removed > 0 {
            tracing::debug!("Cache sweep removed {} entries", removed);
        }
        removed
    }

    /// Starts the periodic cache sweep.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let balancer = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(balancer.config.sweep_interval);
            loop {
                interval.tick().await;
                balancer.sweep();
            }
        })
    }

    /// Connects to the next reachable node, trying at most `connect_attempts` selections.
    pub async fn connect_node(&self) -> Option<(Address, TcpStream)> {
        for _ in 0..self.config.connect_attempts {
            let node = self.selector.select()?;
            match client::connect(&node).await {
                Ok(stream) => return Some((node, stream)),
                Err(e) => tracing::warn!("{}, sending request to another node", e),
            }
        }
        None
    }

    /// Sends the raw request to a node in one write and returns its whole reply.
    async fn forward(&self, raw: &[u8]) -> Option<Vec<u8>> {
        let (node, mut stream) = self.connect_node().await?;

        if let Err(e) = stream.write_all(raw).await {
            tracing::warn!("Failed to send request to {}: {}", node, e);
            return None;
        }

        let mut response = Vec::new();
        if let Err(e) = stream
            .take(self.config.max_message as u64)
            .read_to_end(&mut response)
            .await
        {
            tracing::warn!("Failed to read response from {}: {}", node, e);
            return None;
        }
        tracing::debug!("Relayed {} bytes from {}", response.len(), node);

        Some(response)
    }

    /// Forwards the request and relays the reply to the client.
    ///
    /// Returns the node's reply as text, or `None` if no node could be reached.
    async fn relay(&self, client: &mut TcpStream, raw: &[u8]) -> Result<Option<String>> {
        match self.forward(raw).await {
            Some(response) => {
                client.write_all(&response).await?;
                Ok(Some(String::from_utf8_lossy(&response).into_owned()))
            }
            None => {
                tracing::error!("No node reachable for request");
                client
                    .write_all(HttpResponse::no_node_reachable().encode().as_bytes())
                    .await?;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl ConnectionHandler for LoadBalancer {
    async fn handle(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let read = {
            let mut reader = BufReader::new((&mut stream).take(self.config.max_message as u64));
            read_request_raw(&mut reader).await?
        };
        let Some((request, raw)) = read else {
            return Ok(());
        };
        let raw = raw.into_bytes();

        match request {
            Request::Status => {
                stream
                    .write_all(Reply::alive(Tier::LoadBalancer).encode().as_bytes())
                    .await?;
            }
            Request::Update { payload } => match Address::decode_list(&payload, Tier::Node) {
                Some(nodes) => {
                    self.selector.replace(nodes);
                    stream
                        .write_all(Reply::new(Tier::LoadBalancer, ACK_UPDATED).encode().as_bytes())
                        .await?;
                }
                None => tracing::warn!("Malformed UPDATE from {}: {:?}", peer, payload),
            },
            Request::Malformed(_) | Request::Read { .. } | Request::Write { .. } => {
                tracing::warn!("Unexpected request from {}: {:?}", peer, request);
                return Ok(());
            }
            _ if self.selector.is_empty() => {
                stream
                    .write_all(HttpResponse::unavailable().encode().as_bytes())
                    .await?;
            }
            Request::HttpPut { short, long } => {
                let response = self.relay(&mut stream, &raw).await?;
                if response.as_deref().and_then(HttpResponse::status_of) == Some(201) {
                    self.remember(&short, &long);
                    tracing::debug!("Cached {} after write", short);
                }
            }
            Request::HttpGet { path } if path != FAVICON => {
                if let Some(long) = self.cached(&path) {
                    tracing::debug!("Serving {} from cache", path);
                    stream
                        .write_all(HttpResponse::redirect(&long).encode().as_bytes())
                        .await?;
                } else if let Some(response) = self.relay(&mut stream, &raw).await?
                    && HttpResponse::status_of(&response) == Some(307)
                    && let Some(long) = HttpResponse::location_of(&response)
                {
                    self.remember(&path, &long);
                    tracing::debug!("Cached {} after read", path);
                }
            }
            Request::HttpGet { .. } => {
                self.relay(&mut stream, &raw).await?;
            }
        }

        stream.flush().await?;
        Ok(())
    }
}
