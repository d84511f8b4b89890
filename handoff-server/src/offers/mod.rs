//! Offers: registered files waiting to be redeemed
//!
//! An upload becomes an offer in three steps: the content is persisted under a
//! unique storage name, the path is registered under a fresh redemption code,
//! and a one-shot transfer server is spawned on the port equal to that code.

pub mod registry;
pub mod server;
pub mod storage;

use tracing::{debug, warn};

pub use registry::{OfferRegistry, RegistryFull};
pub use server::{
    BoundOffer, TransferConfig, TransferError, TransferOutcome, bind_offer, serve,
    spawn_transfer_server,
};

/// Drain the registry and delete every stored file it still held
///
/// Returns the number of offers drained. Deletion failures are logged and
/// otherwise ignored.
pub async fn discard_all(registry: &OfferRegistry) -> usize {
    let paths = registry.drain();
    for path in &paths {
        match storage::discard(path).await {
            Ok(()) => debug!(path = %path.display(), "discarded unclaimed offer"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to discard offer"),
        }
    }
    paths.len()
}
