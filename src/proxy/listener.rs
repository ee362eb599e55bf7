//! TCP listener with connection admission control.
//!
//! # Responsibilities
//! - Bind the proxy port
//! - Enforce max_connections via a semaphore
//! - Spawn one detached handler task per accepted connection
//! - Keep accepting after per-connection or accept failures

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::proxy::handler::ConnectionHandler;

/// Pause after a failed accept, e.g. when the process is out of descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Global counter for connection IDs; only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier attached to each connection's tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A bounded TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting pauses until a connection finishes.
pub struct ProxyListener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl ProxyListener {
    /// Bind to `addr` with room for `max_connections` concurrent connections.
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::from_listener(listener, max_connections))
    }

    /// Wrap an already bound listener.
    pub fn from_listener(inner: TcpListener, max_connections: usize) -> Self {
        if let Ok(local_addr) = inner.local_addr() {
            info!(address = %local_addr, max_connections, "Listener bound");
        }
        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// The returned permit must be held for the connection's lifetime.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr, OwnedSemaphorePermit)> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "connection limit closed"))?;

        let (stream, addr) = self.inner.accept().await?;

        debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, permit))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    // == Serve ==
    /// Accept loop. Each connection runs detached in its own task; its
    /// result is logged there and never reaches this loop.
    pub async fn serve(self, handler: ConnectionHandler) {
        loop {
            let (stream, peer, permit) = match self.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let handler = handler.clone();
            let id = ConnectionId::new();
            let span = info_span!("connection", id = %id, peer = %peer);

            tokio::spawn(
                async move {
                    let _permit = permit;
                    match handler.handle(stream).await {
                        Ok(outcome) => info!(?outcome, "Connection served"),
                        Err(err) if err.is_client_fault() => {
                            debug!(error = %err, "Request rejected")
                        }
                        Err(err) => warn!(error = %err, "Transaction aborted"),
                    }
                }
                .instrument(span),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
        assert_eq!(format!("{}", ConnectionId(7)), "conn-7");
    }

    #[tokio::test]
    async fn test_accept_holds_permit_until_dropped() {
        let listener = ProxyListener::bind("127.0.0.1:0".parse().unwrap(), 2)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
        assert_eq!(listener.max_connections(), 2);
    }

    #[tokio::test]
    async fn test_serve_survives_rejected_connections() {
        let listener = ProxyListener::bind("127.0.0.1:0".parse().unwrap(), 4)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let cache = Arc::new(CacheStore::new(1024, 512));
        let handler = ConnectionHandler::new(cache, Duration::from_secs(5));
        let server = tokio::spawn(listener.serve(handler));

        for _ in 0..3 {
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"DELETE http://127.0.0.1/ HTTP/1.0\r\n\r\n")
                .await
                .unwrap();
            let mut received = Vec::new();
            let _ = client.read_to_end(&mut received).await;
            assert!(received.is_empty());
        }

        assert!(!server.is_finished());
        server.abort();
    }
}
