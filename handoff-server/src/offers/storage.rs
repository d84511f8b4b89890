//! Stored file naming and persistence
//!
//! Uploaded content is written to `<upload-dir>/<uuid>_<name>`. The uuid
//! prefix keeps concurrent uploads of the same name apart; stripping it gives
//! back the name advertised to the downloading peer.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use handoff_common::validators::{FALLBACK_FILENAME, sanitize_filename};

/// Separator between the uniqueness token and the original name
const TOKEN_SEPARATOR: char = '_';

/// Build a collision-free storage name for a client filename
///
/// The client name is sanitized down to its base name; unusable names are
/// replaced with [`FALLBACK_FILENAME`].
#[must_use]
pub fn storage_name(client_filename: &str) -> String {
    let name = sanitize_filename(client_filename).unwrap_or_else(|| FALLBACK_FILENAME.to_string());
    format!("{}{TOKEN_SEPARATOR}{name}", Uuid::new_v4())
}

/// Recover the original filename from a stored file path
///
/// Strips the `<uuid>_` prefix when present; any other name is returned as is.
#[must_use]
pub fn original_name(stored: &Path) -> String {
    let file_name = stored
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

    match file_name.split_once(TOKEN_SEPARATOR) {
        Some((token, rest)) if !rest.is_empty() && Uuid::parse_str(token).is_ok() => {
            rest.to_string()
        }
        _ => file_name,
    }
}

/// Write uploaded content to a fresh file in `upload_dir`
///
/// Returns the path of the stored file.
pub async fn persist(upload_dir: &Path, client_filename: &str, content: &[u8]) -> io::Result<PathBuf> {
    let path = upload_dir.join(storage_name(client_filename));
    tokio::fs::write(&path, content).await?;
    Ok(path)
}

/// Delete a stored file, ignoring files that are already gone
pub async fn discard(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
