//! Connection handler.
//!
//! Drives one client connection through the proxy pipeline:
//! request line, method check, header block, cache lookup, and on a miss
//! the origin round trip with streaming relay and optional cache insert.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{ProxyError, Result, Stage};
use crate::proxy::capture::CaptureBuffer;
use crate::proxy::headers::{build_upstream_request, read_line, HeaderBlock, RequestLine};
use crate::proxy::origin::OriginConnection;
use crate::proxy::uri::Target;
use crate::proxy::with_deadline;

/// How a successfully handled connection was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Served from the cache without contacting the origin
    CacheHit { bytes: usize },
    /// Relayed from the origin; `cached` tells whether the response was stored
    Relayed { bytes: u64, cached: bool },
}

/// Per-connection request pipeline sharing one cache.
///
/// Cheap to clone; every accepted connection gets its own copy.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    cache: Arc<CacheStore>,
    io_timeout: Duration,
    error_responses: bool,
}

impl ConnectionHandler {
    pub fn new(cache: Arc<CacheStore>, io_timeout: Duration) -> Self {
        Self {
            cache,
            io_timeout,
            error_responses: false,
        }
    }

    pub fn from_config(cache: Arc<CacheStore>, config: &Config) -> Self {
        Self::new(cache, config.io_timeout()).with_error_responses(config.error_responses)
    }

    /// Reply with a minimal HTTP error instead of closing silently when a
    /// request fails before any response byte was sent.
    pub fn with_error_responses(mut self, enabled: bool) -> Self {
        self.error_responses = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    // == Handle ==
    /// Serves one request on `stream`, then shuts the stream down.
    ///
    /// Both the client stream and any origin connection are closed on every
    /// path, successful or not.
    pub async fn handle<S>(&self, stream: S) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let result = self.serve(&mut reader, &mut writer).await;

        if let Err(err) = &result {
            if let Some((code, reason)) = err.status().filter(|_| self.error_responses) {
                let reply = error_reply(code, reason);
                let written = with_deadline(self.io_timeout, Stage::WritingToClient, async {
                    writer
                        .write_all(reply.as_bytes())
                        .await
                        .map_err(ProxyError::ClientIo)
                })
                .await;
                if let Err(e) = written {
                    debug!(error = %e, code, "Failed to send error reply");
                }
            }
        }

        let closed = with_deadline(self.io_timeout, Stage::ClosingClient, async {
            writer.shutdown().await.map_err(ProxyError::ClientIo)
        })
        .await;
        if let Err(e) = closed {
            debug!(error = %e, "Failed to shut down client stream");
        }

        result
    }

    async fn serve<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<Outcome>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let line = with_deadline(self.io_timeout, Stage::ReadingRequestLine, read_line(reader))
            .await?
            .ok_or_else(|| {
                ProxyError::MalformedRequest("connection closed before request line".to_string())
            })?;
        let request = RequestLine::from_bytes(&line)?;
        if !request.is_get() {
            return Err(ProxyError::UnsupportedMethod(request.method));
        }

        let headers = with_deadline(
            self.io_timeout,
            Stage::ReadingRequestHeaders,
            HeaderBlock::read_from(reader),
        )
        .await?;

        // The lookup holds the cache lock only while it copies the payload handle
        if let Some(payload) = self.cache.lookup(&request.uri) {
            debug!(uri = %request.uri, bytes = payload.len(), "Cache hit");
            with_deadline(self.io_timeout, Stage::WritingToClient, async {
                writer.write_all(&payload).await.map_err(ProxyError::ClientIo)?;
                writer.flush().await.map_err(ProxyError::ClientIo)
            })
            .await?;
            return Ok(Outcome::CacheHit {
                bytes: payload.len(),
            });
        }
        debug!(uri = %request.uri, "Cache miss");

        let target = Target::parse(&request.uri)?;
        let upstream = build_upstream_request(&target, &headers);

        let mut origin = OriginConnection::connect(&target, self.io_timeout).await?;
        origin.send(&upstream).await?;

        let mut capture = CaptureBuffer::new(self.cache.max_object_size());
        let bytes = origin.relay(writer, &mut capture).await?;

        if capture.overflowed() {
            debug!(uri = %request.uri, bytes = capture.seen(), "Response too large to cache");
        }
        let cached = match capture.into_payload() {
            Some(payload) => self.cache.insert(request.uri, payload),
            None => false,
        };

        Ok(Outcome::Relayed { bytes, cached })
    }
}

fn error_reply(code: u16, reason: &str) -> String {
    let body = format!("{} {}\n", code, reason);
    format!(
        "HTTP/1.0 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        code,
        reason,
        body.len(),
        body
    )
}
