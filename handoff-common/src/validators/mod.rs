//! Input validation functions
//!
//! Validators for client-supplied values. Shared so the relay and any client
//! tooling agree on what a usable filename looks like.

mod filename;

pub use filename::{FALLBACK_FILENAME, MAX_FILENAME_LENGTH, base_name, sanitize_filename};
