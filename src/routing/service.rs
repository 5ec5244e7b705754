use super::partitioner::{fallback_targets, replica_targets, shard_index};
use crate::cluster::client;
use crate::cluster::protocol::{
    ACK_STORED, ACK_UPDATED, HttpResponse, Reply, Request, read_request,
};
use crate::cluster::server::ConnectionHandler;
use crate::cluster::types::{Address, Tier};
use crate::cluster::validation::{is_valid_long, is_valid_short};

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Stored,
    Invalid,
    Failed,
    NoShards,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetOutcome {
    Found(String),
    NotFound,
    NoShards,
}

/// Routing node: maps short keys to shards, replicates writes, falls back on reads.
///
/// The shard list is swapped whole on UPDATE. Each operation works on the snapshot
/// it took when it started, so a concurrent update never shows it a half-replaced list.
pub struct RoutingNode {
    shards: RwLock<Arc<Vec<Address>>>,
}

impl RoutingNode {
    pub fn new(shards: Vec<Address>) -> Arc<Self> {
        tracing::info!("Routing node starting with {} shard(s)", shards.len());
        Arc::new(Self {
            shards: RwLock::new(Arc::new(shards)),
        })
    }

    pub fn shards(&self) -> Arc<Vec<Address>> {
        self.shards
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn replace_shards(&self, shards: Vec<Address>) {
        let mut current = self
            .shards
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::info!(
            "Shard list replaced: {} -> {} shard(s)",
            current.len(),
            shards.len()
        );
        *current = Arc::new(shards);
    }

    /// Validates and stores a pair on its primary shard and neighbour replicas.
    ///
    /// The outcome depends only on the primary's acknowledgement; replica failures are logged.
    pub async fn put(&self, short: &str, long: &str) -> PutOutcome {
        if !is_valid_short(short) || !is_valid_long(long) {
            tracing::debug!("Rejected invalid pair {:?} -> {:?}", short, long);
            return PutOutcome::Invalid;
        }

        let shards = self.shards();
        let Some(index) = shard_index(short, shards.len()) else {
            tracing::warn!("PUT {}: no shards known", short);
            return PutOutcome::NoShards;
        };

        let request = Request::Write {
            short: short.to_string(),
            long: long.to_string(),
        };

        let mut outcome = PutOutcome::Failed;
        for (n, target) in replica_targets(index, shards.len()).into_iter().enumerate() {
            let shard = &shards[target];
            let stored = match client::exchange(shard, &request).await {
                Ok(reply) => reply.body == ACK_STORED,
                Err(e) => {
                    tracing::warn!("WRITE {} to {} failed: {}", short, shard, e);
                    false
                }
            };

            if n == 0 {
                outcome = if stored {
                    PutOutcome::Stored
                } else {
                    PutOutcome::Failed
                };
            } else if !stored {
                tracing::warn!("Replica write of {} to {} not acknowledged", short, shard);
            }
        }

        outcome
    }

    /// Reads from the primary, then the neighbours, returning the first non-empty value.
    pub async fn get(&self, short: &str) -> GetOutcome {
        let shards = self.shards();
        let Some(index) = shard_index(short, shards.len()) else {
            tracing::warn!("GET {}: no shards known", short);
            return GetOutcome::NoShards;
        };

        let request = Request::Read {
            short: short.to_string(),
        };

        for target in fallback_targets(index, shards.len()) {
            let shard = &shards[target];
            match client::exchange(shard, &request).await {
                Ok(reply) if !reply.body.is_empty() => {
                    if target != index {
                        tracing::debug!("GET {} served by neighbour {}", short, shard);
                    }
                    return GetOutcome::Found(reply.body);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("READ {} from {} failed: {}", short, shard, e),
            }
        }

        GetOutcome::NotFound
    }

    async fn http_get(&self, path: &str) -> HttpResponse {
        if !is_valid_short(path) {
            return HttpResponse::not_found();
        }
        match self.get(path).await {
            GetOutcome::Found(long) => HttpResponse::redirect(&long),
            GetOutcome::NotFound => HttpResponse::not_found(),
            GetOutcome::NoShards => HttpResponse::unavailable(),
        }
    }

    async fn http_put(&self, short: &str, long: &str) -> HttpResponse {
        match self.put(short, long).await {
            PutOutcome::Stored => HttpResponse::created(),
            PutOutcome::Invalid => HttpResponse::bad_request(),
            PutOutcome::Failed => HttpResponse::server_error(),
            PutOutcome::NoShards => HttpResponse::unavailable(),
        }
    }
}

#[async_trait]
impl ConnectionHandler for RoutingNode {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(request) = read_request(&mut reader).await? else {
            return Ok(());
        };

        let response = match request {
            Request::Status => Reply::alive(Tier::Node).encode(),
            Request::Update { payload } => match Address::decode_list(&payload, Tier::Database) {
                Some(shards) => {
                    self.replace_shards(shards);
                    Reply::new(Tier::Node, ACK_UPDATED).encode()
                }
                None => {
                    tracing::warn!("Malformed UPDATE from {}: {:?}", peer, payload);
                    return Ok(());
                }
            },
            Request::HttpGet { path } => self.http_get(&path).await.encode(),
            Request::HttpPut { short, long } => self.http_put(&short, &long).await.encode(),
            other => {
                tracing::warn!("Unexpected request from {}: {:?}", peer, other);
                return Ok(());
            }
        };

        write_half.write_all(response.as_bytes()).await?;
        write_half.flush().await?;
        Ok(())
    }
}
