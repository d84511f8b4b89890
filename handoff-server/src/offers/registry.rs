//! Offer registry mapping redemption codes to stored files
//!
//! The registry is the only state shared between concurrent uploads and
//! downloads. Code selection and insertion happen under a single lock so two
//! uploads can never both see the same code as free.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;

use handoff_common::code::{CODE_SPACE, generate_code};

/// Number of random draws before `offer` gives up on finding a free code
///
/// Several times the code space, so a miss means the registry is saturated
/// rather than unlucky.
pub const MAX_CODE_ATTEMPTS: usize = CODE_SPACE * 4;

/// Returned when no free redemption code could be found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no free redemption code ({active} offers registered)")]
pub struct RegistryFull {
    /// Number of offers registered when the draw gave up
    pub active: usize,
}

/// Registry of outstanding offers
///
/// Thread-safe registry that allows:
/// - Registering a stored file under a fresh, unique code
/// - Looking up the file for a code
/// - Retiring an offer (timeout) and draining all offers (shutdown)
#[derive(Debug)]
pub struct OfferRegistry {
    offers: Mutex<HashMap<u16, PathBuf>>,
    generator: fn() -> u16,
}

impl OfferRegistry {
    /// Create a new empty registry using the standard code generator
    pub fn new() -> Self {
        Self::with_generator(generate_code)
    }

    /// Create a registry that draws candidate codes from `generator`
    pub fn with_generator(generator: fn() -> u16) -> Self {
        Self {
            offers: Mutex::new(HashMap::new()),
            generator,
        }
    }

    /// Register a stored file and return its redemption code
    ///
    /// Draws candidates until one is not currently registered, then inserts
    /// the mapping while still holding the lock.
    ///
    /// # Errors
    ///
    /// Returns `RegistryFull` if no free code turns up within
    /// [`MAX_CODE_ATTEMPTS`] draws.
    pub fn offer(&self, path: impl Into<PathBuf>) -> Result<u16, RegistryFull> {
        let mut offers = self.offers.lock().expect("offer registry lock poisoned");

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = (self.generator)();
            if let std::collections::hash_map::Entry::Vacant(entry) = offers.entry(code) {
                entry.insert(path.into());
                return Ok(code);
            }
        }

        Err(RegistryFull {
            active: offers.len(),
        })
    }

    /// Look up the stored file for a code
    ///
    /// `None` is the normal answer for unknown or retired codes.
    pub fn lookup(&self, code: u16) -> Option<PathBuf> {
        self.offers
            .lock()
            .expect("offer registry lock poisoned")
            .get(&code)
            .cloned()
    }

    /// Remove an offer, returning its stored file path
    pub fn remove(&self, code: u16) -> Option<PathBuf> {
        self.offers
            .lock()
            .expect("offer registry lock poisoned")
            .remove(&code)
    }

    /// Remove an offer only if it still points at `path`
    ///
    /// Used when retiring an offer so a stale task never removes a mapping it
    /// does not own.
    pub fn remove_if(&self, code: u16, path: &Path) -> bool {
        let mut offers = self.offers.lock().expect("offer registry lock poisoned");
        if offers.get(&code).is_some_and(|p| p == path) {
            offers.remove(&code);
            true
        } else {
            false
        }
    }

    /// Remove every offer, returning the stored file paths
    pub fn drain(&self) -> Vec<PathBuf> {
        self.offers
            .lock()
            .expect("offer registry lock poisoned")
            .drain()
            .map(|(_, path)| path)
            .collect()
    }

    /// Number of registered offers
    pub fn len(&self) -> usize {
        self.offers
            .lock()
            .expect("offer registry lock poisoned")
            .len()
    }

    /// Whether no offers are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OfferRegistry {
    fn default() -> Self {
        Self::new()
    }
}
