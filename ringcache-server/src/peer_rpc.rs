//! Peer RPC listener: accepts connections from other nodes and dispatches
//! each frame to the named Group.

use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};

use ringcache_common::{
    decode, read_frame, write_frame, ErrorResponse, GetRequest, GetResponse, MessageTag, Result,
    SetRequest, SetResponse,
};
use ringcache_core::{byte_view_from_wire, GroupRegistry};

use crate::metrics::Metrics;

/// Binds `addr` and serves peer RPCs until the process exits, spawning one
/// task per connection.
pub async fn serve(addr: &str, groups: Arc<GroupRegistry>, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "peer rpc listener started");
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let groups = Arc::clone(&groups);
        let metrics = Arc::clone(&metrics);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, groups, metrics).await {
                tracing::debug!(%peer_addr, %err, "peer connection ended");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, groups: Arc<GroupRegistry>, metrics: Arc<Metrics>) -> Result<()> {
    loop {
        let (tag, body) = match read_frame(&mut stream).await {
            Ok(frame) => frame,
            Err(_) => return Ok(()), // peer closed the connection
        };

        let start = Instant::now();
        metrics.record_request_start();

        match tag {
            MessageTag::Get => {
                let req: GetRequest = decode(&body)?;
                match handle_get(&groups, &req).await {
                    Ok(value) => write_frame(&mut stream, MessageTag::GetResponse, &GetResponse { value }).await?,
                    Err(err) => {
                        metrics.record_error();
                        write_frame(&mut stream, MessageTag::ErrorFrame, &ErrorResponse::from(&err)).await?;
                    }
                }
            }
            MessageTag::Set => {
                let req: SetRequest = decode(&body)?;
                match handle_set(&groups, &req).await {
                    Ok(()) => write_frame(&mut stream, MessageTag::SetResponse, &SetResponse { ok: true }).await?,
                    Err(err) => {
                        metrics.record_error();
                        write_frame(&mut stream, MessageTag::ErrorFrame, &ErrorResponse::from(&err)).await?;
                    }
                }
            }
            other => {
                metrics.record_error();
                tracing::warn!(?other, "unexpected request tag on peer listener");
                return Ok(());
            }
        }

        metrics.record_request_end(start.elapsed());
    }
}

async fn handle_get(groups: &GroupRegistry, req: &GetRequest) -> Result<Vec<u8>> {
    let group = groups
        .get(&req.group)
        .ok_or_else(|| ringcache_common::Error::Internal(format!("unknown group {}", req.group)))?;
    let view = group.get(&req.key).await?;
    Ok(view.byte_slice())
}

async fn handle_set(groups: &GroupRegistry, req: &SetRequest) -> Result<()> {
    let group = groups
        .get(&req.group)
        .ok_or_else(|| ringcache_common::Error::Internal(format!("unknown group {}", req.group)))?;
    let value = byte_view_from_wire(req.value.clone(), req.expire);
    group.set(&req.key, value, req.is_hot).await
}
