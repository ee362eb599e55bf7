//! Proxy Module
//!
//! Per-connection request pipeline: request line and header parsing, target
//! decomposition, upstream request rewriting, origin relay and the accept
//! loop that feeds connections to the handler.

pub mod capture;
pub mod handler;
pub mod headers;
pub mod listener;
pub mod origin;
pub mod uri;

use std::future::Future;
use std::time::Duration;

use crate::error::{ProxyError, Result, Stage};

pub use capture::CaptureBuffer;
pub use handler::{ConnectionHandler, Outcome};
pub use headers::{build_upstream_request, HeaderBlock, RequestLine, USER_AGENT};
pub use listener::{ConnectionId, ProxyListener};
pub use origin::OriginConnection;
pub use uri::Target;

/// Runs `fut` under a deadline, reporting `stage` if it expires.
pub(crate) async fn with_deadline<F, T>(limit: Duration, stage: Stage, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ProxyError::Timeout(stage))?
}
