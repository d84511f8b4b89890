//! Download handling
//!
//! The gateway redeems a code by connecting to the offer's transfer server as
//! an ordinary peer. The peer stream carries no length, so the content is
//! staged in a temporary file first; the response can then declare an exact
//! `Content-Length`. Connecting and every read from the peer are bounded by
//! the peer timeout, so a silent peer cannot hold a worker.

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use handoff_common::STREAM_BUFFER_SIZE;
use handoff_common::code::is_valid_code;
use handoff_common::validators::sanitize_filename;
use handoff_common::wire::{self, DEFAULT_DOWNLOAD_NAME};

use crate::constants::{ERR_INVALID_CODE, STAGING_PREFIX, STAGING_SUFFIX};

use super::Gateway;
use super::error::GatewayError;
use super::parse::Request;
use super::response::Response;

/// Bound on connecting to a transfer server and on each read from it
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Content fetched from a transfer server and parked on disk
#[derive(Debug)]
pub struct StagedDownload {
    /// Name advertised by the sender, safe for a `Content-Disposition` value
    pub filename: String,
    /// Size of the staged content in bytes
    pub len: u64,
    file: File,
    path: TempPath,
}

impl StagedDownload {
    /// Path of the staging file (removed when the download is dropped)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Turn the staged content into an attachment response
    pub fn into_response(self) -> Response {
        Response::attachment(&self.filename, self.file, self.len, self.path)
    }
}

/// Parse the redemption code from the last segment of a download path
///
/// Only codes the generator can produce are accepted, so the gateway never
/// connects to arbitrary local ports.
pub fn parse_code(segment: &str) -> Result<u16, GatewayError> {
    segment
        .rsplit('/')
        .next()
        .unwrap_or(segment)
        .parse::<u16>()
        .ok()
        .filter(|code| is_valid_code(*code))
        .ok_or(GatewayError::BadRequest(ERR_INVALID_CODE))
}

/// Handle a download request for the code in `segment`
pub async fn handle_download(
    gateway: &Gateway,
    request: &Request,
    segment: &str,
) -> Result<Response, GatewayError> {
    if request.method != "GET" {
        return Err(GatewayError::MethodNotAllowed);
    }

    let code = parse_code(segment)?;
    let config = gateway.config();
    let peer = SocketAddr::new(config.peer_host, code);

    let staged = fetch(peer, &config.staging_dir, config.peer_timeout)
        .await
        .map_err(|e| {
            if e.is_client_error() {
                warn!(code, %peer, error = %e, "download failed");
            } else {
                error!(code, %peer, error = %e, "download failed");
            }
            e
        })?;

    info!(code, file = %staged.filename, bytes = staged.len, "download staged");
    Ok(staged.into_response())
}

/// Redeem an offer from its transfer server into a staging file
///
/// Reads the header line, then copies everything up to end of stream. Peer
/// failures, including a peer silent for longer than `peer_timeout`, map to
/// [`GatewayError::Peer`]; staging failures are local and map to
/// [`GatewayError::Internal`].
pub async fn fetch(
    peer: SocketAddr,
    staging_dir: &Path,
    peer_timeout: Duration,
) -> Result<StagedDownload, GatewayError> {
    let stream = match timeout(peer_timeout, TcpStream::connect(peer)).await {
        Ok(result) => result.map_err(GatewayError::Peer)?,
        Err(_) => return Err(timed_out("connect")),
    };
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, stream);

    let advertised = match timeout(peer_timeout, wire::read_header(&mut reader)).await {
        Ok(result) => result?,
        Err(_) => return Err(timed_out("header read")),
    };
    let filename =
        sanitize_filename(&advertised).unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());
    debug!(%peer, file = %filename, "received transfer header");

    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(staging_dir)
        .map_err(GatewayError::Internal)?;
    let (file, path) = staging.into_parts();
    let mut file = File::from_std(file);

    loop {
        let chunk = match timeout(peer_timeout, reader.fill_buf()).await {
            Ok(result) => result.map_err(GatewayError::Peer)?,
            Err(_) => return Err(timed_out("content read")),
        };
        if chunk.is_empty() {
            break;
        }
        file.write_all(chunk).await.map_err(GatewayError::Internal)?;
        let n = chunk.len();
        reader.consume(n);
    }
    file.flush().await.map_err(GatewayError::Internal)?;

    let len = file.metadata().await.map_err(GatewayError::Internal)?.len();

    Ok(StagedDownload {
        filename,
        len,
        file,
        path,
    })
}

fn timed_out(stage: &str) -> GatewayError {
    GatewayError::Peer(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("transfer server {stage} timed out"),
    ))
}
