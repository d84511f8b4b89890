//! Gateway error type
//!
//! Every failure a request can hit maps to one variant, and every variant
//! maps to a status code and a plain-text body. Client mistakes and
//! unreachable peers are 4xx; local disk or runtime failures are 5xx.

use std::io;

use thiserror::Error;

use handoff_common::wire::WireError;

use crate::offers::RegistryFull;

use super::response::Response;

/// Error produced while handling a gateway request
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed request or unusable input
    #[error("Bad Request: {0}")]
    BadRequest(&'static str),
    /// Method not supported on this route
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    /// Unknown route
    #[error("Not Found")]
    NotFound,
    /// The client started a request but did not finish it in time
    #[error("Request Timeout")]
    RequestTimeout,
    /// Body without a `Content-Length` (chunked bodies are not accepted)
    #[error("Length Required")]
    LengthRequired,
    /// Body larger than the configured upload limit
    #[error("Payload Too Large: limit is {0} bytes")]
    PayloadTooLarge(u64),
    /// Connecting to or reading from the transfer server failed
    #[error("Error downloading file: {0}")]
    Peer(#[source] io::Error),
    /// No redemption code is available
    #[error("Service Unavailable: {0}")]
    Unavailable(#[from] RegistryFull),
    /// Local failure (disk, runtime)
    #[error("Server Error: {0}")]
    Internal(#[source] io::Error),
}

impl GatewayError {
    /// HTTP status code for this error
    pub fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::Peer(_) => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::RequestTimeout => 408,
            Self::LengthRequired => 411,
            Self::PayloadTooLarge(_) => 413,
            Self::Internal(_) => 500,
            Self::Unavailable(_) => 503,
        }
    }

    /// Whether the error is the client's (4xx) rather than the relay's (5xx)
    pub fn is_client_error(&self) -> bool {
        self.status() < 500
    }

    /// Render the error as a plain-text response
    pub fn into_response(self) -> Response {
        Response::text(self.status(), self.to_string())
    }
}

impl From<WireError> for GatewayError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Io(e) => Self::Peer(e),
            other => Self::Peer(io::Error::new(io::ErrorKind::InvalidData, other)),
        }
    }
}
