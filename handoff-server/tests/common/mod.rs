//! Shared helpers for gateway integration tests

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use handoff_common::code::generate_code;
use handoff_common::protocol::UploadResponse;
use handoff_server::gateway::{Gateway, GatewayConfig};
use handoff_server::offers::OfferRegistry;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A gateway running on a loopback port with private directories
pub struct TestRelay {
    pub addr: SocketAddr,
    pub registry: Arc<OfferRegistry>,
    pub upload_dir: TempDir,
    pub staging_dir: TempDir,
}

/// Start a gateway with default settings
pub async fn start_relay() -> TestRelay {
    start_relay_with(|_| {}).await
}

/// Start a gateway after adjusting its configuration
pub async fn start_relay_with(adjust: impl FnOnce(&mut GatewayConfig)) -> TestRelay {
    handoff_server::logging::init_for_tests();

    let upload_dir = TempDir::new().expect("Failed to create upload dir");
    let staging_dir = TempDir::new().expect("Failed to create staging dir");

    let mut config = GatewayConfig::new(upload_dir.path());
    config.staging_dir = staging_dir.path().to_path_buf();
    config.peer_host = IpAddr::V4(Ipv4Addr::LOCALHOST);
    config.transfer.bind = IpAddr::V4(Ipv4Addr::LOCALHOST);
    adjust(&mut config);

    let registry = Arc::new(OfferRegistry::new());
    let gateway = Arc::new(Gateway::new(config, Arc::clone(&registry)));

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(gateway.serve(listener));

    TestRelay {
        addr,
        registry,
        upload_dir,
        staging_dir,
    }
}

/// A parsed HTTP response
#[derive(Debug)]
pub struct HttpReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpReply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Send raw request bytes and read the whole response
pub async fn send_raw(addr: SocketAddr, request: &[u8]) -> HttpReply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    parse_reply(&raw)
}

fn parse_reply(raw: &[u8]) -> HttpReply {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).into_owned();
    let mut lines = head.split("\r\n");

    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("malformed status line");
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    HttpReply {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}

/// Build a single-file multipart body
pub fn multipart_body(boundary: &str, filename: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Build a POST request with the given content type and body
pub fn post(path: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    request.extend_from_slice(body);
    request
}

/// Build a body-less request
pub fn request(method: &str, path: &str) -> Vec<u8> {
    format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").into_bytes()
}

/// Upload a file and return the raw reply
pub async fn upload_reply(addr: SocketAddr, filename: &str, content: &[u8]) -> HttpReply {
    let boundary = "XYZ123";
    let body = multipart_body(boundary, filename, "application/octet-stream", content);
    send_raw(
        addr,
        &post(
            "/upload",
            &format!("multipart/form-data; boundary={boundary}"),
            &body,
        ),
    )
    .await
}

/// Upload a file and return its redemption code
pub async fn upload(addr: SocketAddr, filename: &str, content: &[u8]) -> u16 {
    let reply = upload_reply(addr, filename, content).await;
    assert_eq!(reply.status, 200, "upload failed: {}", reply.text());
    let response: UploadResponse = serde_json::from_slice(&reply.body).unwrap();
    response.port
}

/// Connect to the transfer server for `code`
///
/// The listener is bound before the upload replies, so one attempt suffices.
pub async fn connect_transfer(code: u16) -> TcpStream {
    TcpStream::connect((Ipv4Addr::LOCALHOST, code))
        .await
        .unwrap_or_else(|e| panic!("transfer server for code {code} is not listening: {e}"))
}

/// Download through the gateway
pub async fn download(addr: SocketAddr, code: u16) -> HttpReply {
    send_raw(addr, &request("GET", &format!("/download/{code}"))).await
}

/// A valid redemption code with nothing listening on its port
pub fn unused_code() -> u16 {
    loop {
        let code = generate_code();
        if std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, code)).is_ok() {
            return code;
        }
    }
}

/// Number of entries in a directory
pub fn count_entries(dir: &TempDir) -> usize {
    std::fs::read_dir(dir.path()).unwrap().count()
}
