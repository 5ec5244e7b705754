//! Peer Client
//!
//! One-shot request/reply exchange with another tier: connect, write the whole
//! request, read the two reply lines, close. No timeouts are applied; a peer that
//! accepts but never answers stalls the caller.

use super::protocol::{Reply, Request};
use super::types::Address;
use crate::error::ClientError;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Opens a connection to `target`.
pub async fn connect(target: &Address) -> Result<TcpStream, ClientError> {
    TcpStream::connect(target.socket_addr())
        .await
        .map_err(|source| ClientError::Connect {
            target: target.to_string(),
            source,
        })
}

/// Sends `request` to `target` and waits for its reply.
pub async fn exchange(target: &Address, request: &Request) -> Result<Reply, ClientError> {
    let mut stream = connect(target).await?;
    let io_err = |source| ClientError::Io {
        target: target.to_string(),
        source,
    };

    stream
        .write_all(request.encode().as_bytes())
        .await
        .map_err(io_err)?;
    stream.flush().await.map_err(io_err)?;

    let mut reader = BufReader::new(stream);
    let mut tag = String::new();
    let mut body = String::new();

    if reader.read_line(&mut tag).await.map_err(io_err)? == 0 {
        return Err(ClientError::EmptyReply {
            target: target.to_string(),
        });
    }
    reader.read_line(&mut body).await.map_err(io_err)?;

    let reply = Reply {
        tag: tag.trim_end_matches(['\r', '\n']).to_string(),
        body: body.trim_end_matches(['\r', '\n']).to_string(),
    };
    tracing::debug!("{} replied {}/{}", target, reply.tag, reply.body);

    Ok(reply)
}

/// Sends STATUS and reports whether `target` answered with its own tier's alive marker.
pub async fn probe(target: &Address) -> bool {
    match exchange(target, &Request::Status).await {
        Ok(reply) => reply.body == target.tier.alive_marker(),
        Err(e) => {
            tracing::debug!("Status probe failed: {}", e);
            false
        }
    }
}
