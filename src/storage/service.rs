use super::store::UrlStore;
use crate::cluster::protocol::{ACK_STORED, Reply, Request, read_request};
use crate::cluster::server::{ConnectionHandler, ServerHandle};
use crate::cluster::types::Tier;
use crate::error::StoreError;

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// One storage shard: answers READ, WRITE and STATUS against its own store.
///
/// An unrecoverable store error fails the shard's server, so the process exits
/// instead of serving from a broken store. Other shards are unaffected.
pub struct StorageShard {
    store: Arc<dyn UrlStore>,
    server: ServerHandle,
}

impl StorageShard {
    pub fn new(store: Arc<dyn UrlStore>, server: ServerHandle) -> Arc<Self> {
        Arc::new(Self { store, server })
    }

    pub async fn read(&self, short: String) -> Result<Option<String>, StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.read(&short))
            .await
            .map_err(|e| StoreError::Unrecoverable(e.to_string()))?
    }

    pub async fn write(&self, short: String, long: String) -> Result<(), StoreError> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.write(&short, &long))
            .await
            .map_err(|e| StoreError::Unrecoverable(e.to_string()))?
    }

    fn fatal(&self, error: StoreError) -> anyhow::Error {
        tracing::error!("Storage failure, shutting shard down: {}", error);
        self.server.fail(format!("storage failure: {}", error));
        anyhow::anyhow!(error)
    }
}

#[async_trait]
impl ConnectionHandler for StorageShard {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(request) = read_request(&mut reader).await? else {
            return Ok(());
        };

        let reply = match request {
            Request::Status => Reply::alive(Tier::Database),
            Request::Read { short } => match self.read(short).await {
                Ok(long) => Reply::new(Tier::Database, long.unwrap_or_default()),
                Err(e) => return Err(self.fatal(e)),
            },
            Request::Write { short, long } => {
                tracing::debug!("WRITE {} -> {}", short, long);
                match self.write(short, long).await {
                    Ok(()) => Reply::new(Tier::Database, ACK_STORED),
                    Err(e) => return Err(self.fatal(e)),
                }
            }
            other => {
                tracing::warn!("Unexpected request from {}: {:?}", peer, other);
                return Ok(());
            }
        };

        write_half.write_all(reply.encode().as_bytes()).await?;
        write_half.flush().await?;
        Ok(())
    }
}
