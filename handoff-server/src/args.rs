//! Command-line argument parsing

use clap::Parser;
use handoff_common::{DEFAULT_GATEWAY_PORT, DEFAULT_MAX_UPLOAD_SIZE, DEFAULT_WORKERS};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::DEFAULT_UPLOAD_DIR_NAME;

/// Handoff one-shot file relay
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address the HTTP gateway binds to (IPv4 or IPv6)
    #[arg(short, long, default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port the HTTP gateway listens on
    #[arg(short, long, default_value_t = DEFAULT_GATEWAY_PORT)]
    pub port: u16,

    /// Directory uploaded files are stored in (default: <system temp>/handoff-uploads)
    #[arg(short, long = "upload-dir")]
    pub upload_dir: Option<PathBuf>,

    /// IP address transfer servers bind to
    #[arg(long = "transfer-bind", default_value = "0.0.0.0")]
    pub transfer_bind: IpAddr,

    /// Host the gateway connects to when redeeming a code
    #[arg(long = "peer-host", default_value = "127.0.0.1")]
    pub peer_host: IpAddr,

    /// Maximum number of requests handled concurrently
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Seconds an unclaimed offer waits before it is discarded (0 waits forever)
    #[arg(long = "offer-timeout", default_value_t = 0)]
    pub offer_timeout: u64,

    /// Largest accepted upload request body in bytes
    #[arg(long = "max-upload-size", default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: u64,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, default_value = "false")]
    pub debug: bool,
}

impl Args {
    /// Upload directory, falling back to the platform temp dir
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_UPLOAD_DIR_NAME))
    }

    /// Offer timeout, `None` when offers wait indefinitely
    pub fn offer_timeout(&self) -> Option<Duration> {
        (self.offer_timeout > 0).then(|| Duration::from_secs(self.offer_timeout))
    }
}
