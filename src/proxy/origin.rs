//! Origin client: connect, send the rewritten request, relay the response.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{ProxyError, Result, Stage};
use crate::proxy::capture::CaptureBuffer;
use crate::proxy::uri::Target;
use crate::proxy::with_deadline;

/// Bytes read from the origin per relay step.
pub const CHUNK_SIZE: usize = 8192;

/// An open connection to an origin server.
#[derive(Debug)]
pub struct OriginConnection {
    stream: TcpStream,
    addr: String,
    limit: Duration,
}

impl OriginConnection {
    /// Connects to `target`, applying `limit` to the connect and every later
    /// read or write.
    pub async fn connect(target: &Target, limit: Duration) -> Result<Self> {
        let addr = target.authority();
        let port: u16 = target
            .port
            .parse()
            .map_err(|_| ProxyError::MalformedRequest(format!("invalid port '{}'", target.port)))?;

        let stream = with_deadline(limit, Stage::ConnectingToOrigin, async {
            TcpStream::connect((target.host.as_str(), port))
                .await
                .map_err(|source| ProxyError::OriginUnreachable {
                    addr: addr.clone(),
                    source,
                })
        })
        .await?;

        debug!(origin = %addr, "Connected to origin");
        Ok(Self {
            stream,
            addr,
            limit,
        })
    }

    // == Send ==
    /// Writes the complete upstream request.
    pub async fn send(&mut self, request: &[u8]) -> Result<()> {
        let stream = &mut self.stream;
        with_deadline(self.limit, Stage::WritingToOrigin, async {
            stream.write_all(request).await.map_err(ProxyError::OriginIo)?;
            stream.flush().await.map_err(ProxyError::OriginIo)
        })
        .await
    }

    // == Relay ==
    /// Streams the origin response to `client` chunk by chunk until the
    /// origin closes, feeding every chunk to `capture` as well.
    ///
    /// Returns the number of bytes relayed.
    pub async fn relay<W>(&mut self, client: &mut W, capture: &mut CaptureBuffer) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut relayed = 0u64;

        loop {
            let stream = &mut self.stream;
            let n = with_deadline(self.limit, Stage::ReadingFromOrigin, async {
                stream.read(&mut buf).await.map_err(ProxyError::OriginIo)
            })
            .await?;
            if n == 0 {
                break;
            }

            let chunk = &buf[..n];
            with_deadline(self.limit, Stage::WritingToClient, async {
                client.write_all(chunk).await.map_err(ProxyError::ClientIo)
            })
            .await?;
            capture.push(chunk);
            relayed += n as u64;
        }

        with_deadline(self.limit, Stage::WritingToClient, async {
            client.flush().await.map_err(ProxyError::ClientIo)
        })
        .await?;

        debug!(origin = %self.addr, bytes = relayed, "Origin response relayed");
        Ok(relayed)
    }
}
