//! HTTP relay gateway
//!
//! A minimal HTTP/1.1 front end for the offer machinery: one request per
//! connection, bodies read by `Content-Length`, every response closes the
//! connection. A semaphore sized by `workers` bounds how many requests are
//! handled at once; accepted connections wait for a permit.
//!
//! Routes (each also accepted under `/api`):
//! - `POST /upload` turns a multipart upload into an offer
//! - `GET /download/<code>` redeems an offer through its transfer server
//! - `OPTIONS *` answers CORS preflight

pub mod download;
pub mod error;
pub mod parse;
pub mod response;
pub mod upload;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, trace, warn};

use handoff_common::{DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_WORKERS};

use crate::constants::{
    API_PREFIX, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, ROUTE_DOWNLOAD,
    ROUTE_UPLOAD,
};
use crate::offers::{OfferRegistry, TransferConfig};

pub use error::GatewayError;
pub use parse::{Request, RequestLimits};
pub use response::Response;

/// Gateway settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Directory uploads are stored in
    pub upload_dir: PathBuf,
    /// Directory download staging files are created in
    pub staging_dir: PathBuf,
    /// Host the download handler connects to for transfer servers
    pub peer_host: IpAddr,
    /// Maximum number of requests handled concurrently
    pub workers: usize,
    /// Largest accepted request body in bytes
    pub max_upload_size: u64,
    /// How long a new connection may stay silent before it is dropped
    pub idle_timeout: Duration,
    /// Bound on finishing a request head, and on each body read
    pub request_timeout: Duration,
    /// Bound on connecting to a transfer server and on each read from it
    pub peer_timeout: Duration,
    /// Settings handed to every spawned transfer server
    pub transfer: TransferConfig,
}

impl GatewayConfig {
    /// Configuration with defaults for everything but the upload directory
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            staging_dir: std::env::temp_dir(),
            peer_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            workers: DEFAULT_WORKERS,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            idle_timeout: parse::DEFAULT_IDLE_TIMEOUT,
            request_timeout: parse::DEFAULT_REQUEST_TIMEOUT,
            peer_timeout: download::DEFAULT_PEER_TIMEOUT,
            transfer: TransferConfig::default(),
        }
    }

    /// Limits applied while reading requests
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_body: self.max_upload_size,
            idle_timeout: self.idle_timeout,
            request_timeout: self.request_timeout,
        }
    }
}

/// Route a request resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Preflight,
    Upload,
    /// Download; carries everything after `/download/`
    Download(&'a str),
    NotFound,
}

/// Resolve a method and path to a route
///
/// Method checks happen in the handlers so a known path with the wrong method
/// gets 405 rather than 404.
pub fn route<'a>(method: &str, path: &'a str) -> Route<'a> {
    if method == "OPTIONS" {
        return Route::Preflight;
    }

    let path = path.strip_prefix(API_PREFIX).unwrap_or(path);
    if path == ROUTE_UPLOAD {
        Route::Upload
    } else if let Some(rest) = path.strip_prefix(ROUTE_DOWNLOAD) {
        Route::Download(rest)
    } else {
        Route::NotFound
    }
}

/// The relay gateway: configuration, shared registry and worker pool
#[derive(Debug)]
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<OfferRegistry>,
    workers: Arc<Semaphore>,
}

impl Gateway {
    /// Create a gateway sharing `registry` with its transfer servers
    ///
    /// A `workers` value of zero is treated as one.
    pub fn new(config: GatewayConfig, registry: Arc<OfferRegistry>) -> Self {
        let workers = Arc::new(Semaphore::new(config.workers.max(1)));
        Self {
            config,
            registry,
            workers,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<OfferRegistry> {
        &self.registry
    }

    /// Accept connections until the task is cancelled
    ///
    /// Each connection is handled on its own task holding a worker permit.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, workers = self.config.workers.max(1), "gateway started");
        }

        loop {
            let Ok(permit) = Arc::clone(&self.workers).acquire_owned().await else {
                // Semaphore closed: nothing more will be served
                return;
            };

            let (stream, peer) = match listener.accept().await {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "failed to accept gateway connection");
                    continue;
                }
            };

            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                let _permit = permit;
                gateway.handle_connection(stream, peer).await;
            });
        }
    }

    /// Read one request, dispatch it and write the response
    pub async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let (response, method, path) =
            match parse::read_request(&mut stream, self.config.request_limits()).await {
                Ok(Some(request)) => {
                    let method = request.method.clone();
                    let path = request.path.clone();
                    (self.dispatch(&request).await, method, path)
                }
                Ok(None) => {
                    debug!(%peer, "connection closed without a request");
                    return;
                }
                Err(e) => {
                    debug!(%peer, error = %e, "rejected request");
                    (e.into_response(), String::new(), String::new())
                }
            };

        let response = response.with_header("Access-Control-Allow-Origin", CORS_ALLOW_ORIGIN);
        let status = response.status();
        info!(%peer, %method, %path, status, "request handled");

        if let Err(e) = response.write_to(&mut stream).await {
            debug!(%peer, error = %e, "failed to send response");
            return;
        }

        if let Err(e) = stream.shutdown().await {
            trace!(%peer, error = %e, "socket shutdown error");
        }
    }

    /// Route a request to its handler and render errors as responses
    pub async fn dispatch(&self, request: &Request) -> Response {
        let result = match route(&request.method, &request.path) {
            Route::Preflight => Ok(preflight()),
            Route::Upload => upload::handle_upload(self, request).await,
            Route::Download(segment) => download::handle_download(self, request, segment).await,
            Route::NotFound => Err(GatewayError::NotFound),
        };

        result.unwrap_or_else(GatewayError::into_response)
    }
}

/// CORS preflight response
fn preflight() -> Response {
    Response::empty(204)
        .with_header("Access-Control-Allow-Methods", CORS_ALLOW_METHODS)
        .with_header("Access-Control-Allow-Headers", CORS_ALLOW_HEADERS)
}
