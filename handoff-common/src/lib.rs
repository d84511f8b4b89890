//! Handoff Common Library
//!
//! Protocol pieces shared by the relay and its clients: redemption codes, the
//! multipart decoder, the transfer wire header and filename validation.

pub mod code;
pub mod multipart;
pub mod protocol;
pub mod validators;
pub mod wire;

/// Default port for the relay gateway
pub const DEFAULT_GATEWAY_PORT: u16 = 8080;

/// Default maximum accepted upload body in bytes (512 MiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 512 * 1024 * 1024;

/// Default number of requests the gateway handles concurrently
pub const DEFAULT_WORKERS: usize = 10;

/// Buffer size for streaming file data (64KB)
pub const STREAM_BUFFER_SIZE: usize = 64 * 1024;
