//! Transfer wire protocol
//!
//! A transfer server sends a single ASCII header line followed by the raw file
//! bytes. There is no length prefix, checksum or end marker; the sender closes
//! the connection to signal end of file.
//!
//! ```text
//! Filename: hello.txt\n
//! <raw file content...>
//! ```

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Prefix of the header line, including the separating space
pub const HEADER_PREFIX: &str = "Filename: ";

/// Maximum length of a header line in bytes, including the newline
pub const MAX_HEADER_LINE: usize = 4096;

/// Filename used when the header line is missing or unusable
pub const DEFAULT_DOWNLOAD_NAME: &str = "downloaded-file";

const LINE_END: u8 = b'\n';

/// Error reading a header line
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// No newline within `MAX_HEADER_LINE` bytes
    #[error("header line exceeds {} bytes", MAX_HEADER_LINE)]
    HeaderTooLong,
}

/// Encode the header line for a file name
#[must_use]
pub fn encode_header(filename: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(HEADER_PREFIX.len() + filename.len() + 1);
    line.extend_from_slice(HEADER_PREFIX.as_bytes());
    line.extend_from_slice(filename.as_bytes());
    line.push(LINE_END);
    line
}

/// Extract the file name from a header line
///
/// Accepts the line with or without its trailing newline (and a stray
/// carriage return). The space after the colon is optional so older senders
/// that wrote `Filename:<name>` are still understood. Returns `None` when the
/// line is not a header or names nothing.
#[must_use]
pub fn parse_header(line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    let prefix = HEADER_PREFIX.trim_end();
    let name = text.strip_prefix(prefix)?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Write the header line for `filename`
pub async fn write_header<W>(writer: &mut W, filename: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_header(filename)).await
}

/// Read bytes up to and including the first newline
///
/// Reads one byte at a time so nothing past the newline is consumed; wrap the
/// stream in a `BufReader` to avoid a syscall per byte. Returns whatever was
/// read if the stream ends before a newline.
pub async fn read_header_line<R>(reader: &mut R) -> Result<Vec<u8>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        let byte = match reader.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(line),
            Err(e) => return Err(e.into()),
        };
        line.push(byte);
        if byte == LINE_END {
            return Ok(line);
        }
        if line.len() >= MAX_HEADER_LINE {
            return Err(WireError::HeaderTooLong);
        }
    }
}

/// Read the header line and resolve the advertised file name
///
/// Falls back to [`DEFAULT_DOWNLOAD_NAME`] when the line is not a header.
pub async fn read_header<R>(reader: &mut R) -> Result<String, WireError>
where
    R: AsyncRead + Unpin,
{
    let line = read_header_line(reader).await?;
    Ok(parse_header(&line).unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string()))
}
