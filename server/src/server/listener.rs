//! Accept loops for TCP and Unix socket listeners.
//!
//! A failure on one connection is logged and never stops the loop.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tracing::{error, warn};

use crate::queue::QueueManager;

use super::connection::{handle_connection, Session};

/// Serve TCP clients until the task is dropped.
pub async fn serve_tcp(listener: TcpListener, queue_manager: Arc<QueueManager>) {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "Accept failed");
                continue;
            }
        };
        if let Err(e) = socket.set_nodelay(true) {
            warn!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
        }
        let (reader, writer) = socket.into_split();
        spawn_connection(reader, writer, Arc::clone(&queue_manager), Session::new(peer.to_string()));
    }
}

/// Serve Unix socket clients until the task is dropped.
pub async fn serve_unix(listener: UnixListener, queue_manager: Arc<QueueManager>) {
    loop {
        let socket = match listener.accept().await {
            Ok((socket, _)) => socket,
            Err(e) => {
                error!(error = %e, "Accept failed");
                continue;
            }
        };
        let (reader, writer) = socket.into_split();
        spawn_connection(reader, writer, Arc::clone(&queue_manager), Session::new("unix"));
    }
}

fn spawn_connection<R, W>(reader: R, writer: W, queue_manager: Arc<QueueManager>, session: Session)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let (id, peer) = (session.id, session.peer.clone());
        if let Err(e) = handle_connection(reader, writer, queue_manager, session).await {
            warn!(session = id, peer = %peer, error = %e, "Connection closed with error");
        }
    });
}
