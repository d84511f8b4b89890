//! Upload handling
//!
//! **Upload flow:**
//! 1. Require `POST` with a `multipart/form-data` content type
//! 2. Decode the first file part from the buffered body
//! 3. Persist it under `<uuid>_<name>` in the upload directory
//! 4. Register the stored path under a fresh redemption code
//! 5. Bind the offer's transfer listener, spawn its transfer task and answer
//!    `{"port":<code>}`

use tracing::{error, info, warn};

use handoff_common::multipart;
use handoff_common::protocol::UploadResponse;

use crate::constants::{ERR_NOT_MULTIPART, ERR_UNPARSEABLE_UPLOAD};
use crate::offers::{bind_offer, spawn_transfer_server, storage};

use super::Gateway;
use super::error::GatewayError;
use super::parse::Request;
use super::response::Response;

/// Handle an upload request
///
/// The transfer listener is bound before responding, so the returned code can
/// be redeemed immediately. Accepting the peer happens in the background.
pub async fn handle_upload(gateway: &Gateway, request: &Request) -> Result<Response, GatewayError> {
    if request.method != "POST" {
        return Err(GatewayError::MethodNotAllowed);
    }

    let content_type = request.header("content-type").unwrap_or_default();
    if !multipart::is_multipart(content_type) {
        return Err(GatewayError::BadRequest(ERR_NOT_MULTIPART));
    }
    let boundary = multipart::extract_boundary(content_type)
        .ok_or(GatewayError::BadRequest(ERR_UNPARSEABLE_UPLOAD))?;
    let payload = multipart::decode(&request.body, boundary)
        .ok_or(GatewayError::BadRequest(ERR_UNPARSEABLE_UPLOAD))?;

    let config = gateway.config();
    let stored = storage::persist(&config.upload_dir, &payload.filename, &payload.content)
        .await
        .map_err(|e| {
            error!(dir = %config.upload_dir.display(), error = %e, "failed to store upload");
            GatewayError::Internal(e)
        })?;

    let registry = gateway.registry();
    let code = match registry.offer(&stored) {
        Ok(code) => code,
        Err(full) => {
            warn!(active = full.active, "no free redemption code");
            if let Err(e) = storage::discard(&stored).await {
                warn!(path = %stored.display(), error = %e, "failed to remove stored upload");
            }
            return Err(full.into());
        }
    };

    info!(
        code,
        file = %storage::original_name(&stored),
        bytes = payload.content.len(),
        content_type = %payload.content_type,
        "file offered"
    );

    match bind_offer(registry, code, &config.transfer) {
        Ok(offer) => {
            spawn_transfer_server(offer);
        }
        Err(e) => {
            // The code can never be redeemed; drop the offer but still answer
            warn!(code, error = %e, "offer unavailable");
            if let Some(path) = registry.remove(code) {
                if let Err(e) = storage::discard(&path).await {
                    warn!(path = %path.display(), error = %e, "failed to remove stored upload");
                }
            }
        }
    }

    Ok(Response::json(200, &UploadResponse { port: code }))
}
