//! Request line parsing and upstream header rewriting.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ProxyError, Result};
use crate::proxy::uri::Target;

/// Longest request or header line accepted, terminator included.
pub const MAX_LINE_LEN: usize = 8192;

/// Most header lines accepted in one request.
pub const MAX_HEADER_LINES: usize = 100;

/// Identity presented to every origin.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

/// Client headers never forwarded upstream.
const DROPPED_HEADERS: [&str; 3] = ["connection", "proxy-connection", "user-agent"];

// == Line Reading ==
/// Reads one `\n`-terminated line of at most `MAX_LINE_LEN` bytes.
///
/// Returns `Ok(None)` on a clean end of stream before any byte arrived.
/// A partial line at end of stream or an overlong line is malformed. The
/// bytes are returned as received, terminator included.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_LEN as u64)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(ProxyError::ClientIo)?;

    if n == 0 {
        return Ok(None);
    }
    if !buf.ends_with(b"\n") {
        let reason = if n >= MAX_LINE_LEN {
            format!("line exceeds {} bytes", MAX_LINE_LEN)
        } else {
            "line not terminated before end of stream".to_string()
        };
        return Err(ProxyError::MalformedRequest(reason));
    }
    Ok(Some(buf))
}

fn trim_terminator(mut line: Vec<u8>) -> Vec<u8> {
    while let Some(b'\r' | b'\n') = line.last() {
        line.pop();
    }
    line
}

// == Request Line ==
/// `<method> <uri> <version>` from the first line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

impl RequestLine {
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(uri), Some(version), None) if version.starts_with("HTTP/") => {
                Ok(Self {
                    method: method.to_string(),
                    uri: uri.to_string(),
                    version: version.to_string(),
                })
            }
            _ => Err(ProxyError::MalformedRequest(format!(
                "bad request line '{}'",
                line.trim_end()
            ))),
        }
    }

    /// Parses a raw request line, which must be valid UTF-8.
    pub fn from_bytes(line: &[u8]) -> Result<Self> {
        let line = std::str::from_utf8(line).map_err(|_| {
            ProxyError::MalformedRequest("request line is not valid UTF-8".to_string())
        })?;
        Self::parse(line)
    }

    /// GET, compared case-insensitively.
    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

// == Header Block ==
/// The client's header lines in arrival order, stored without terminators.
///
/// Lines are kept as raw bytes so values carrying non-UTF-8 octets are
/// forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    lines: Vec<Vec<u8>>,
}

impl HeaderBlock {
    /// Reads header lines up to and including the blank line ending the block.
    pub async fn read_from<R>(reader: &mut R) -> Result<Self>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = Vec::new();
        loop {
            let line = read_line(reader).await?.ok_or_else(|| {
                ProxyError::MalformedRequest("header block not terminated".to_string())
            })?;
            let line = trim_terminator(line);
            if line.is_empty() {
                return Ok(Self { lines });
            }
            if !line.contains(&b':') {
                return Err(ProxyError::MalformedRequest(format!(
                    "header line without colon '{}'",
                    String::from_utf8_lossy(&line)
                )));
            }
            if lines.len() == MAX_HEADER_LINES {
                return Err(ProxyError::MalformedRequest(format!(
                    "more than {} header lines",
                    MAX_HEADER_LINES
                )));
            }
            lines.push(line);
        }
    }

    pub fn from_lines<I, L>(lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Vec<u8>>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// First line whose header name matches `name`, case-insensitively.
    pub fn find(&self, name: &str) -> Option<&[u8]> {
        self.lines
            .iter()
            .find(|line| header_name(line).eq_ignore_ascii_case(name.as_bytes()))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.lines.iter().map(Vec::as_slice)
    }
}

fn header_name(line: &[u8]) -> &[u8] {
    let name = match line.iter().position(|&b| b == b':') {
        Some(colon) => &line[..colon],
        None => line,
    };
    name.trim_ascii()
}

// == Upstream Request ==
/// Builds the HTTP/1.0 request sent to the origin.
///
/// Layout: request line, Host (client's own or synthesized), the proxy
/// User-Agent, `Connection: close`, `Proxy-Connection: close`, then every
/// other client header in order, then the blank line.
pub fn build_upstream_request(target: &Target, headers: &HeaderBlock) -> Vec<u8> {
    let mut out = format!("GET {} HTTP/1.0\r\n", target.path).into_bytes();

    match headers.find("host") {
        Some(host) => out.extend_from_slice(host),
        None => out.extend_from_slice(format!("Host: {}", target.host).as_bytes()),
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(format!("User-Agent: {}\r\n", USER_AGENT).as_bytes());
    out.extend_from_slice(b"Connection: close\r\n");
    out.extend_from_slice(b"Proxy-Connection: close\r\n");

    for line in headers.iter() {
        let name = header_name(line);
        if name.eq_ignore_ascii_case(b"host")
            || DROPPED_HEADERS
                .iter()
                .any(|d| name.eq_ignore_ascii_case(d.as_bytes()))
        {
            continue;
        }
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }

    out.extend_from_slice(b"\r\n");
    out
}
