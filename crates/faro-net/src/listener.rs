//! Server-side RPC listener.
//!
//! An [`RpcListener`] accepts connections on one endpoint and dispatches
//! every decoded request payload to a [`Handler`]. Connections are served
//! concurrently, one task each; requests on a single connection are answered
//! in order.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use faro_proto::{Message, Payload};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::frame::{read_message, write_message};
use crate::RpcError;

/// Dispatch target for one endpoint.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Handles one request payload and produces the response payload.
    async fn handle(&self, payload: Payload) -> Payload;
}

/// A running RPC endpoint.
///
/// Dropping the listener (or calling [`shutdown`](RpcListener::shutdown))
/// closes the listening socket; no further connections are accepted.
#[derive(Debug)]
pub struct RpcListener {
    local_addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

impl RpcListener {
    /// Binds the endpoint and starts accepting connections.
    pub async fn bind(addr: SocketAddr, handler: Arc<dyn Handler>) -> Result<Self, RpcError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let handler = Arc::clone(&handler);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler).await {
                                debug!(%peer, error = %e, "connection ended");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        });

        Ok(Self {
            local_addr,
            accept_task,
        })
    }

    /// Returns the address the endpoint is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and closes the listening socket.
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for RpcListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    handler: Arc<dyn Handler>,
) -> Result<(), RpcError> {
    loop {
        let request = match read_message(&mut stream).await {
            Err(RpcError::Closed) => return Ok(()),
            other => other?,
        };

        let response = handler.handle(request.payload).await;
        write_message(&mut stream, &Message::new(request.request_id, response)).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faro_proto::ErrorCode;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn handle(&self, payload: Payload) -> Payload {
            match payload {
                Payload::Flag { value } => Payload::Flag { value: !value },
                _ => Payload::error(ErrorCode::InvalidRequest, "echo only handles Flag"),
            }
        }
    }

    #[tokio::test]
    async fn test_listener_serves_requests() {
        let listener = RpcListener::bind("127.0.0.1:0".parse().unwrap(), Arc::new(Echo))
            .await
            .unwrap();

        let mut stream = TcpStream::connect(listener.local_addr()).await.unwrap();
        write_message(&mut stream, &Message::new(9, Payload::Flag { value: false }))
            .await
            .unwrap();

        let response = read_message(&mut stream).await.unwrap();
        assert_eq!(response.request_id, 9);
        assert!(matches!(response.payload, Payload::Flag { value: true }));
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_connections() {
        let listener = RpcListener::bind("127.0.0.1:0".parse().unwrap(), Arc::new(Echo))
            .await
            .unwrap();
        let addr = listener.local_addr();

        listener.shutdown();
        // Give the abort a moment to close the socket.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(TcpStream::connect(addr).await.is_err());
    }
}
