//! Error types for the proxy
//!
//! Provides unified error handling using thiserror. Every variant is local to
//! the connection that produced it; none of them reach the accept loop.

use std::fmt;
use std::io;

use thiserror::Error;

// == Stage ==
/// Point in a transaction where a deadline can expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ReadingRequestLine,
    ReadingRequestHeaders,
    ConnectingToOrigin,
    WritingToOrigin,
    ReadingFromOrigin,
    WritingToClient,
    ClosingClient,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Stage::ReadingRequestLine => "reading request line",
            Stage::ReadingRequestHeaders => "reading request headers",
            Stage::ConnectingToOrigin => "connecting to origin",
            Stage::WritingToOrigin => "writing to origin",
            Stage::ReadingFromOrigin => "reading from origin",
            Stage::WritingToClient => "writing to client",
            Stage::ClosingClient => "closing client",
        };
        f.write_str(text)
    }
}

// == Proxy Error Enum ==
/// Unified error type for a single proxied transaction.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Request line, URI or header block could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Method other than GET
    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Connecting to the origin failed
    #[error("Origin unreachable at {addr}: {source}")]
    OriginUnreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the origin failed after connecting
    #[error("Origin I/O error: {0}")]
    OriginIo(#[source] io::Error),

    /// Reading from or writing to the client failed
    #[error("Client I/O error: {0}")]
    ClientIo(#[source] io::Error),

    /// A read, write or connect deadline expired
    #[error("Timed out while {0}")]
    Timeout(Stage),
}

impl ProxyError {
    // == Status Mapping ==
    /// Returns the status line sent back to the client when hardened error
    /// replies are enabled.
    ///
    /// Errors that can occur after response bytes were relayed map to `None`.
    pub fn status(&self) -> Option<(u16, &'static str)> {
        match self {
            ProxyError::MalformedRequest(_) => Some((400, "Bad Request")),
            ProxyError::UnsupportedMethod(_) => Some((405, "Method Not Allowed")),
            ProxyError::OriginUnreachable { .. } => Some((502, "Bad Gateway")),
            ProxyError::Timeout(Stage::ConnectingToOrigin) => Some((504, "Gateway Timeout")),
            ProxyError::Timeout(_) | ProxyError::OriginIo(_) | ProxyError::ClientIo(_) => None,
        }
    }

    /// True for failures caused by the client's input rather than the network.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ProxyError::MalformedRequest(_) | ProxyError::UnsupportedMethod(_)
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the proxy.
pub type Result<T> = std::result::Result<T, ProxyError>;

// == Config Error ==
/// Raised when configuration values are inconsistent.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_object_size ({object}) must not exceed max_cache_size ({cache})")]
    ObjectLargerThanCache { object: usize, cache: usize },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}
