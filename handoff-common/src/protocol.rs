//! Gateway message bodies
//!
//! The relay gateway answers a successful upload with a small JSON object
//! carrying the redemption code. Errors are plain text and have no type here.

use serde::{Deserialize, Serialize};

/// Body of a successful upload response
///
/// The code is named `port` on the wire because it is also the TCP port the
/// offer's transfer server listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Redemption code for the uploaded file
    pub port: u16,
}
