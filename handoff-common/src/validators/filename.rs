//! Filename sanitizing
//!
//! Client filenames end up in three places: the stored file's name on disk,
//! the transfer wire header and the download `Content-Disposition` header.
//! Sanitizing keeps only the final path component and drops characters that
//! would break any of those.

/// Name substituted when the client supplies no usable filename
pub const FALLBACK_FILENAME: &str = "unnamed-file";

/// Maximum length of a sanitized filename in bytes
///
/// Leaves room for the 37-byte uniqueness prefix of a stored file within the
/// common 255-byte file name limit.
pub const MAX_FILENAME_LENGTH: usize = 200;

/// Return the final path component of a client filename
///
/// Both `/` and `\` are treated as separators regardless of platform, since
/// browsers on Windows may send full paths.
#[must_use]
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Sanitize a client filename for storage and header use
///
/// Keeps the base name, removes control characters and double quotes, trims
/// surrounding whitespace and truncates to [`MAX_FILENAME_LENGTH`] bytes on a
/// character boundary. Returns `None` when nothing usable remains (empty,
/// `.` or `..`); callers substitute [`FALLBACK_FILENAME`].
#[must_use]
pub fn sanitize_filename(name: &str) -> Option<String> {
    let cleaned: String = base_name(name)
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let trimmed = cleaned.trim();

    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return None;
    }

    let mut end = trimmed.len().min(MAX_FILENAME_LENGTH);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    Some(trimmed[..end].to_string())
}
