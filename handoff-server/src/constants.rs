//! Server constants and user-facing messages

/// Directory name under the system temp dir used when `--upload-dir` is unset
pub const DEFAULT_UPLOAD_DIR_NAME: &str = "handoff-uploads";

/// Route prefix accepted in front of every gateway route
pub const API_PREFIX: &str = "/api";

/// Upload route
pub const ROUTE_UPLOAD: &str = "/upload";

/// Download route prefix (followed by the redemption code)
pub const ROUTE_DOWNLOAD: &str = "/download/";

/// Prefix of staging files created for downloads
pub const STAGING_PREFIX: &str = "download-";

/// Suffix of staging files created for downloads
pub const STAGING_SUFFIX: &str = ".tmp";

// CORS
pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

// Request error details (rendered after "Bad Request: ")
pub const ERR_NOT_MULTIPART: &str = "Content-Type must be multipart/form-data";
pub const ERR_UNPARSEABLE_UPLOAD: &str = "Could not parse file content";
pub const ERR_INVALID_CODE: &str = "Invalid port number";

// Startup / shutdown messages
pub const MSG_BANNER: &str = "Handoff relay v";
pub const MSG_LISTENING: &str = "Gateway listening on ";
pub const MSG_UPLOAD_DIR: &str = "Upload directory: ";
pub const MSG_TRANSFER_BIND: &str = "Transfer servers bind to ";
pub const MSG_OFFER_TIMEOUT: &str = "Offers expire after seconds: ";
pub const MSG_SHUTDOWN_RECEIVED: &str = "\nShutdown signal received, cleaning up...";
pub const MSG_OFFERS_DISCARDED: &str = "Discarded unclaimed offers: ";

// Startup errors
pub const ERR_CREATE_UPLOAD_DIR: &str = "Failed to create upload directory: ";
pub const ERR_BIND: &str = "Failed to bind gateway: ";
pub const ERR_WORKERS: &str = "--workers must be at least 1";
pub const ERR_SIGNAL_SIGTERM: &str = "Failed to install SIGTERM handler";
pub const ERR_SIGNAL_SIGINT: &str = "Failed to install SIGINT handler";
#[cfg(not(unix))]
pub const ERR_SIGNAL_CTRLC: &str = "Failed to install Ctrl-C handler";
