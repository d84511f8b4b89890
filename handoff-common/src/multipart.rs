//! Multipart form-data decoding
//!
//! Extracts the first file part from a buffered `multipart/form-data` body by
//! searching for marker byte sequences. There is no structured MIME parsing:
//! the filename comes from the first `filename="` marker, the content starts
//! after the first blank line, and the content ends at the closing boundary
//! (or, failing that, the next part's opening boundary).
//!
//! ```text
//! --XYZ123\r\n
//! Content-Disposition: form-data; name="file"; filename="hello.txt"\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! <content bytes>\r\n
//! --XYZ123--\r\n
//! ```

/// Content type reported when the file part declares none
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Media type prefix a request must declare to be decoded
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";

const FILENAME_MARKER: &[u8] = b"filename=\"";
const CONTENT_TYPE_MARKER: &[u8] = b"Content-Type: ";
const HEADER_END_MARKER: &[u8] = b"\r\n\r\n";
const CRLF: &[u8] = b"\r\n";
const BOUNDARY_PARAM: &str = "boundary=";

/// The file part extracted from a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Filename as sent by the client (may be empty)
    pub filename: String,
    /// Declared content type of the part
    pub content_type: String,
    /// Raw content bytes, untouched
    pub content: Vec<u8>,
}

/// Check whether a `Content-Type` header value is multipart form-data
///
/// The comparison is case-insensitive on the media type prefix.
#[must_use]
pub fn is_multipart(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..MULTIPART_FORM_DATA.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(MULTIPART_FORM_DATA))
}

/// Extract the boundary token from a `Content-Type` header value
///
/// Takes everything after `boundary=`, stops at the next `;` parameter and
/// strips surrounding quotes. Returns `None` when the parameter is missing or
/// empty.
#[must_use]
pub fn extract_boundary(content_type: &str) -> Option<&str> {
    let start = content_type.find(BOUNDARY_PARAM)? + BOUNDARY_PARAM.len();
    let rest = &content_type[start..];
    let value = rest.split(';').next().unwrap_or(rest).trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);

    if value.is_empty() { None } else { Some(value) }
}

/// Find the first occurrence of `needle` in `haystack` at or after `start`
///
/// Returns the absolute offset of the match.
#[must_use]
pub fn find_sequence(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start > haystack.len() {
        return None;
    }
    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| start + pos)
}

/// Decode the first file part of a multipart body
///
/// Returns `None` when the body has no `filename="` marker, a `Content-Type: `
/// marker with no line ending after it, no blank line separating part headers
/// from content, or no boundary after the content.
#[must_use]
pub fn decode(data: &[u8], boundary: &str) -> Option<Payload> {
    // Filename
    let filename_start = find_sequence(data, FILENAME_MARKER, 0)? + FILENAME_MARKER.len();
    let filename_end = find_sequence(data, b"\"", filename_start)?;
    let filename = String::from_utf8_lossy(&data[filename_start..filename_end]).into_owned();

    // Content type (searched after the filename's closing quote)
    let content_type = match find_sequence(data, CONTENT_TYPE_MARKER, filename_end) {
        Some(pos) => {
            let start = pos + CONTENT_TYPE_MARKER.len();
            let end = find_sequence(data, CRLF, start)?;
            String::from_utf8_lossy(&data[start..end]).into_owned()
        }
        None => DEFAULT_CONTENT_TYPE.to_string(),
    };

    // Content bounds
    let content_start = find_sequence(data, HEADER_END_MARKER, 0)? + HEADER_END_MARKER.len();
    let content_end = find_content_end(data, boundary, content_start)?;
    if content_end <= content_start {
        return None;
    }

    Some(Payload {
        filename,
        content_type,
        content: data[content_start..content_end].to_vec(),
    })
}

/// Locate the end of the first part's content
///
/// Prefers the closing boundary (`\r\n--<boundary>--`); falls back to the next
/// part's opening boundary (`\r\n--<boundary>`).
fn find_content_end(data: &[u8], boundary: &str, content_start: usize) -> Option<usize> {
    let closing = format!("\r\n--{boundary}--");
    find_sequence(data, closing.as_bytes(), content_start).or_else(|| {
        let opening = format!("\r\n--{boundary}");
        find_sequence(data, opening.as_bytes(), content_start)
    })
}
