//! One-shot transfer server
//!
//! Each offer gets its own listener on the port equal to its redemption code.
//! The listener accepts exactly one connection, sends the wire header and the
//! file content, then closes both the connection and the listener. Failures
//! only ever affect the offer being served.
//!
//! **Transfer flow:**
//! 1. Resolve the code in the registry (unknown code: nothing happens)
//! 2. Bind `<transfer-bind>:<code>` with a backlog of one, before the
//!    uploader learns the code
//! 3. Accept one peer on the spawned task (optionally within the offer timeout)
//! 4. Stop listening, send `Filename: <name>\n` then the raw bytes
//! 5. Shut down the connection

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use handoff_common::STREAM_BUFFER_SIZE;
use handoff_common::wire;

use super::registry::OfferRegistry;
use super::storage;

/// Pending-connection queue length for an offer listener
const LISTEN_BACKLOG: u32 = 1;

/// Settings shared by every transfer server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Address transfer listeners bind to
    pub bind: IpAddr,
    /// How long an offer waits for its peer before it is retired
    ///
    /// `None` waits indefinitely.
    pub accept_timeout: Option<Duration>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            accept_timeout: None,
        }
    }
}

/// Error serving a single offer
#[derive(Debug, Error)]
pub enum TransferError {
    /// The code is not (or no longer) registered
    #[error("no file is associated with code {0}")]
    UnknownCode(u16),
    /// The offer's port could not be bound
    #[error("failed to bind transfer port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Accepting the peer connection failed
    #[error("failed to accept on transfer port {port}: {source}")]
    Accept {
        port: u16,
        #[source]
        source: io::Error,
    },
    /// Nobody connected before the offer timeout
    #[error("offer {0} was not claimed before the timeout")]
    Timeout(u16),
    /// The stored file could not be opened
    #[error("failed to open offered file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing to the peer failed (usually a mid-transfer disconnect)
    #[error("transfer to {peer} failed: {source}")]
    Send {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// The transfer task panicked or was cancelled
    #[error("transfer task ended abnormally: {0}")]
    Crashed(String),
}

/// Result of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Redemption code that was served
    pub code: u16,
    /// Address of the peer that received the file
    pub peer: SocketAddr,
    /// Name advertised in the wire header
    pub filename: String,
    /// Content bytes sent after the header
    pub bytes_sent: u64,
}

/// An offer whose listener is bound and waiting for its peer
#[derive(Debug)]
pub struct BoundOffer {
    code: u16,
    path: PathBuf,
    listener: TcpListener,
    registry: Arc<OfferRegistry>,
    accept_timeout: Option<Duration>,
}

/// Resolve an offer and bind its listener
///
/// # Errors
///
/// Returns `UnknownCode` if the registry has no file for `code`, or `Bind`
/// if the port is unavailable.
pub fn bind_offer(
    registry: &Arc<OfferRegistry>,
    code: u16,
    config: &TransferConfig,
) -> Result<BoundOffer, TransferError> {
    let path = registry
        .lookup(code)
        .ok_or(TransferError::UnknownCode(code))?;

    let addr = SocketAddr::new(config.bind, code);
    let listener =
        create_listener(addr).map_err(|source| TransferError::Bind { port: code, source })?;

    Ok(BoundOffer {
        code,
        path,
        listener,
        registry: Arc::clone(registry),
        accept_timeout: config.accept_timeout,
    })
}

fn create_listener(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    #[cfg(unix)]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}

impl BoundOffer {
    /// Redemption code of this offer
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept exactly one peer and send it the file
    ///
    /// The listener is closed as soon as the peer is accepted, so later
    /// connection attempts are refused.
    pub async fn serve_one(self) -> Result<TransferOutcome, TransferError> {
        let BoundOffer {
            code,
            path,
            listener,
            registry,
            accept_timeout,
        } = self;

        info!(code, file = %path.display(), "transfer server listening");

        let accepted = match accept_timeout {
            Some(limit) => match tokio::time::timeout(limit, listener.accept()).await {
                Ok(accepted) => accepted,
                Err(_) => {
                    drop(listener);
                    retire(&registry, code, &path).await;
                    return Err(TransferError::Timeout(code));
                }
            },
            None => listener.accept().await,
        };
        let (stream, peer) =
            accepted.map_err(|source| TransferError::Accept { port: code, source })?;
        drop(listener);

        info!(code, %peer, "peer connected");

        let filename = storage::original_name(&path);
        let bytes_sent = send_file(stream, peer, &path, &filename).await?;

        Ok(TransferOutcome {
            code,
            peer,
            filename,
            bytes_sent,
        })
    }
}

/// Stream the header and file content to the peer
async fn send_file(
    mut stream: TcpStream,
    peer: SocketAddr,
    path: &Path,
    filename: &str,
) -> Result<u64, TransferError> {
    let file = File::open(path).await.map_err(|source| TransferError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file);

    let result: io::Result<u64> = async {
        wire::write_header(&mut stream, filename).await?;
        let bytes = tokio::io::copy_buf(&mut reader, &mut stream).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(bytes)
    }
    .await;

    result.map_err(|source| TransferError::Send { peer, source })
}

/// Drop an unclaimed offer and its stored file
async fn retire(registry: &OfferRegistry, code: u16, path: &Path) {
    if registry.remove_if(code, path) {
        if let Err(e) = storage::discard(path).await {
            warn!(code, file = %path.display(), error = %e, "failed to delete expired offer");
        }
    }
    info!(code, "offer expired unclaimed");
}

/// Serve a bound offer to its single peer
///
/// Failures are logged here and returned; they never affect other offers.
pub async fn serve(offer: BoundOffer) -> Result<TransferOutcome, TransferError> {
    let code = offer.code();
    let result = offer.serve_one().await;

    match &result {
        Ok(outcome) => info!(
            code,
            peer = %outcome.peer,
            file = %outcome.filename,
            bytes = outcome.bytes_sent,
            "transfer complete"
        ),
        Err(TransferError::Timeout(_)) => {}
        Err(e) => warn!(code, error = %e, "transfer failed"),
    }

    result
}

/// Run a bound offer's transfer on its own task under a supervisor
///
/// The returned handle resolves when the transfer finishes. Callers may drop
/// it; the supervisor still logs a panicked or cancelled transfer.
pub fn spawn_transfer_server(offer: BoundOffer) -> JoinHandle<Result<TransferOutcome, TransferError>> {
    let code = offer.code();
    let transfer = tokio::spawn(serve(offer));

    tokio::spawn(async move {
        match transfer.await {
            Ok(result) => {
                debug!(code, ok = result.is_ok(), "transfer task finished");
                result
            }
            Err(e) => {
                error!(code, error = %e, "transfer task ended abnormally");
                Err(TransferError::Crashed(e.to_string()))
            }
        }
    })
}
