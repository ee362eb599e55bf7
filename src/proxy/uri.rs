//! Request target decomposition.
//!
//! Splits an absolute-form URI (`http://host[:port]/path`) into the pieces
//! needed to reach the origin. No percent-decoding is done and query strings
//! stay part of the path.

use crate::error::{ProxyError, Result};

/// Port used when the URI does not name one.
pub const DEFAULT_PORT: &str = "80";

/// Host, port and path of an origin request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: String,
    pub path: String,
}

impl Target {
    /// Decomposes `uri`.
    ///
    /// Everything up to and including the first `//` is dropped. A URI with
    /// no `/` after the authority, an empty host, or a non-numeric port is
    /// rejected.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = match uri.find("//") {
            Some(idx) => &uri[idx + 2..],
            None => uri,
        };

        let slash = rest
            .find('/')
            .ok_or_else(|| ProxyError::MalformedRequest(format!("no path in URI '{}'", uri)))?;
        let (authority, path) = rest.split_at(slash);

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port),
            None => (authority, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(ProxyError::MalformedRequest(format!(
                "no host in URI '{}'",
                uri
            )));
        }
        if port.parse::<u16>().is_err() {
            return Err(ProxyError::MalformedRequest(format!(
                "invalid port '{}' in URI '{}'",
                port, uri
            )));
        }

        Ok(Self {
            host: host.to_string(),
            port: port.to_string(),
            path: path.to_string(),
        })
    }

    /// `host:port`, suitable for connecting.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
