//! HTTP request parsing
//!
//! One request per connection: the head is read until the blank line, then the
//! body is read by `Content-Length`. Chunked bodies are refused.
//!
//! Every read is bounded. A connection that sends nothing within the idle
//! timeout is dropped without a response; a head that does not complete, or
//! a body that stalls, within the request timeout gets 408.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::error::GatewayError;

/// Upper bound on the request line plus headers
pub const MAX_HEAD_SIZE: usize = 16 * 1024;

/// Time a new connection may wait before sending its first byte
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for the rest of the head, and for each read of the body
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const READ_CHUNK: usize = 8 * 1024;
const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Bounds applied while reading a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Largest accepted body in bytes
    pub max_body: u64,
    pub idle_timeout: Duration,
    pub request_timeout: Duration,
}

impl RequestLimits {
    /// Default timeouts with the given body limit
    pub fn new(max_body: u64) -> Self {
        Self {
            max_body,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A fully buffered HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Request target with any query string removed
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Request {
    /// Look up a header value (case-insensitive name match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Request line and headers, before the body is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Find the end of HTTP headers (position after \r\n\r\n or \n\n)
pub fn find_header_end(data: &[u8]) -> Option<usize> {
    if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some(pos + 4);
    }
    // Bare LF line endings (hand-typed requests)
    data.windows(2).position(|w| w == b"\n\n").map(|pos| pos + 2)
}

/// Parse the request line and headers
pub fn parse_head(head: &[u8]) -> Result<RequestHead, GatewayError> {
    let text = String::from_utf8_lossy(head);
    let mut lines = text.lines();

    let request_line = lines
        .next()
        .ok_or(GatewayError::BadRequest("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(GatewayError::BadRequest("malformed request line"));
    };
    let path = target.split('?').next().unwrap_or(target);

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(GatewayError::BadRequest("malformed header"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: method.to_ascii_uppercase(),
        path: path.to_string(),
        headers,
    })
}

/// Determine the body length declared by a request head
///
/// No `Content-Length` means no body. Any `Transfer-Encoding` other than
/// `identity` is refused with 411.
pub fn content_length(head: &RequestHead) -> Result<u64, GatewayError> {
    let chunked = head
        .header("transfer-encoding")
        .is_some_and(|encoding| !encoding.eq_ignore_ascii_case("identity"));
    if chunked {
        return Err(GatewayError::LengthRequired);
    }

    match head.header("content-length") {
        Some(value) => value
            .parse::<u64>()
            .map_err(|_| GatewayError::BadRequest("invalid Content-Length")),
        None => Ok(0),
    }
}

/// Read until the end of the head, returning its length
async fn read_head<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
    chunk: &mut [u8],
) -> Result<usize, GatewayError>
where
    S: AsyncRead + Unpin,
{
    loop {
        if let Some(end) = find_header_end(buf.as_slice()) {
            return Ok(end);
        }
        if buf.len() > MAX_HEAD_SIZE {
            return Err(GatewayError::BadRequest("request headers too large"));
        }
        let n = stream.read(chunk).await.map_err(GatewayError::Internal)?;
        if n == 0 {
            return Err(GatewayError::BadRequest("incomplete request"));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Read one request from a connection
///
/// Returns `Ok(None)` when the peer closes, or stays silent past the idle
/// timeout, before sending anything. Answers `Expect: 100-continue` once the
/// declared length has been accepted.
pub async fn read_request<S>(
    stream: &mut S,
    limits: RequestLimits,
) -> Result<Option<Request>, GatewayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    // No idle connections: wait a bounded time for the first bytes
    let n = match timeout(limits.idle_timeout, stream.read(&mut chunk)).await {
        Ok(result) => result.map_err(GatewayError::Internal)?,
        Err(_) => return Ok(None),
    };
    if n == 0 {
        return Ok(None);
    }
    buf.extend_from_slice(&chunk[..n]);

    let header_end = match timeout(
        limits.request_timeout,
        read_head(stream, &mut buf, &mut chunk),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => return Err(GatewayError::RequestTimeout),
    };

    let head = parse_head(&buf[..header_end])?;
    let length = content_length(&head)?;
    if length > limits.max_body {
        return Err(GatewayError::PayloadTooLarge(limits.max_body));
    }

    if length > 0
        && head
            .header("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"))
    {
        stream
            .write_all(CONTINUE_RESPONSE)
            .await
            .map_err(GatewayError::Internal)?;
    }

    // Bounded by max_body above
    let length =
        usize::try_from(length).map_err(|_| GatewayError::PayloadTooLarge(limits.max_body))?;
    let mut body = buf.split_off(header_end);
    body.truncate(length);
    let mut filled = body.len();
    body.resize(length, 0);
    while filled < length {
        let n = match timeout(limits.request_timeout, stream.read(&mut body[filled..])).await {
            Ok(result) => result.map_err(GatewayError::Internal)?,
            Err(_) => return Err(GatewayError::RequestTimeout),
        };
        if n == 0 {
            return Err(GatewayError::BadRequest("incomplete request body"));
        }
        filled += n;
    }

    Ok(Some(Request {
        method: head.method,
        path: head.path,
        headers: head.headers,
        body,
    }))
}
