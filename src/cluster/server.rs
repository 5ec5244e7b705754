//! Connection Server
//!
//! Accepts TCP connections and hands each one to a `ConnectionHandler`, with at most
//! `workers` connections in flight. A worker owns its connection from the first
//! byte read until the reply is written and the socket dropped.

use anyhow::Result;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, Semaphore};

/// Default worker pool size for every tier.
pub const DEFAULT_WORKERS: usize = 8;

/// Per-tier request handling, invoked once per accepted connection.
#[async_trait]
pub trait ConnectionHandler: Send + Sync + 'static {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub workers: usize,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Cloneable control handle for a running server.
///
/// `stop` ends the accept loop; `fail` ends it and makes `run` return the reason as an error.
#[derive(Debug, Clone, Default)]
pub struct ServerHandle {
    shutdown: Arc<Notify>,
    failure: Arc<OnceLock<String>>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.failure.set(reason.into());
        self.shutdown.notify_one();
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.get().map(String::as_str)
    }
}

pub struct LineServer {
    listener: TcpListener,
    workers: usize,
    handle: ServerHandle,
}

impl LineServer {
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            workers: config.workers.max(1),
            handle: ServerHandle::default(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Serves connections until the handle is stopped or failed.
    pub async fn run<H: ConnectionHandler>(self, handler: Arc<H>) -> Result<()> {
        let pool = Arc::new(Semaphore::new(self.workers));

        loop {
            let permit = tokio::select! {
                permit = pool.clone().acquire_owned() => permit?,
                () = self.handle.shutdown.notified() => break,
            };

            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!("Connection from {}", peer);
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            if let Err(e) = handler.handle(stream, peer).await {
                                tracing::warn!("Dropped connection from {}: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                },
                () = self.handle.shutdown.notified() => break,
            }
        }

        match self.handle.failure() {
            Some(reason) => {
                tracing::error!("Server stopped: {}", reason);
                Err(anyhow::anyhow!(reason.to_string()))
            }
            None => {
                tracing::info!("Server stopped");
                Ok(())
            }
        }
    }

    /// Runs the server on a background task and returns its address and handle.
    pub fn spawn<H: ConnectionHandler>(
        self,
        handler: Arc<H>,
    ) -> Result<(SocketAddr, ServerHandle)> {
        let addr = self.local_addr()?;
        let handle = self.handle();
        tokio::spawn(async move {
            if let Err(e) = self.run(handler).await {
                tracing::error!("Server on {} exited: {}", addr, e);
            }
        });
        Ok((addr, handle))
    }
}
