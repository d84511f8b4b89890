//! HTTP response building and writing

use std::io::{self, SeekFrom};

use serde::Serialize;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader};

use handoff_common::STREAM_BUFFER_SIZE;

/// Response body
#[derive(Debug)]
enum Body {
    Empty,
    Bytes(Vec<u8>),
    /// Staged file streamed to the client; the file is deleted when the
    /// response is dropped
    Staged {
        file: File,
        len: u64,
        _path: TempPath,
    },
}

/// An HTTP response, written once with `Connection: close`
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: Body,
}

impl Response {
    /// Response with no body
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Plain-text response
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "text/plain; charset=utf-8".to_string())],
            body: Body::Bytes(body.into().into_bytes()),
        }
    }

    /// JSON response
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                headers: vec![("Content-Type", "application/json".to_string())],
                body: Body::Bytes(body),
            },
            Err(e) => Self::text(500, format!("Server Error: {e}")),
        }
    }

    /// Binary attachment streamed from a staged file
    ///
    /// The first `len` bytes of the file are sent, whatever its cursor position.
    pub fn attachment(filename: &str, file: File, len: u64, path: TempPath) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("Content-Type", "application/octet-stream".to_string()),
                (
                    "Content-Disposition",
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            body: Body::Staged {
                file,
                len,
                _path: path,
            },
        }
    }

    /// Add a header
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Look up a header value (case-insensitive name match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Length the `Content-Length` header will declare
    pub fn content_length(&self) -> u64 {
        match &self.body {
            Body::Empty => 0,
            Body::Bytes(bytes) => bytes.len() as u64,
            Body::Staged { len, .. } => *len,
        }
    }

    /// Serialize the status line and headers
    fn head(&self) -> String {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, status_text(self.status));
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.content_length()));
        head.push_str("Connection: close\r\n\r\n");
        head
    }

    /// Write the response and consume it
    ///
    /// A staged body is streamed in chunks; its file is removed once the
    /// response is dropped here, whether or not the write succeeded.
    pub async fn write_to<W>(self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.head().as_bytes()).await?;
        match self.body {
            Body::Empty => {}
            Body::Bytes(bytes) => writer.write_all(&bytes).await?,
            Body::Staged {
                mut file,
                len,
                _path,
            } => {
                file.seek(SeekFrom::Start(0)).await?;
                let mut reader = BufReader::with_capacity(STREAM_BUFFER_SIZE, file).take(len);
                let sent = tokio::io::copy_buf(&mut reader, writer).await?;
                if sent != len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("staged file ended after {sent} of {len} bytes"),
                    ));
                }
            }
        }
        writer.flush().await
    }
}

/// Reason phrase for a status code
pub fn status_text(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
