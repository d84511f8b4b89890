//! Integration tests for the relay gateway
//!
//! These tests drive a live gateway over loopback sockets: uploads become
//! offers, offers are redeemed either directly from their transfer server or
//! through the gateway's download route.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use common::*;
use handoff_common::code::is_valid_code;
use handoff_common::multipart::MULTIPART_FORM_DATA;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const HELLO: &[u8] = b"Hello World!\nThis is a test file.";

// ============================================================================
// Upload and redemption
// ============================================================================

#[tokio::test]
async fn test_upload_then_raw_transfer() {
    let relay = start_relay().await;

    let reply = upload_reply(relay.addr, "hello.txt", HELLO).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Content-Type"), Some("application/json"));

    let text = reply.text();
    assert!(text.starts_with("{\"port\":") && text.ends_with('}'), "{text}");
    let code: u16 = text["{\"port\":".len()..text.len() - 1].parse().unwrap();
    assert!(is_valid_code(code));

    let mut stream = connect_transfer(code).await;
    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();

    let mut expected = b"Filename: hello.txt\n".to_vec();
    expected.extend_from_slice(HELLO);
    assert_eq!(received, expected);

    // One-shot: the listener is gone
    assert!(
        TcpStream::connect((std::net::Ipv4Addr::LOCALHOST, code))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_upload_then_gateway_download() {
    let relay = start_relay().await;
    let code = upload(relay.addr, "hello.txt", HELLO).await;

    let reply = download(relay.addr, code).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Content-Type"), Some("application/octet-stream"));
    assert_eq!(
        reply.header("Content-Disposition"),
        Some("attachment; filename=\"hello.txt\"")
    );
    assert_eq!(reply.header("Content-Length"), Some("33"));
    assert_eq!(reply.body, HELLO);

    // Staging file is removed once the response is sent
    assert_eq!(count_entries(&relay.staging_dir), 0);
}

#[tokio::test]
async fn test_binary_round_trip() {
    let relay = start_relay().await;
    let mut content: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();
    content.extend_from_slice(b"\r\n--XYZ123\r\n\r\n");
    content.extend_from_slice(&[0, 13, 10, 0]);

    let code = upload(relay.addr, "blob.bin", &content).await;
    let reply = download(relay.addr, code).await;

    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, content);
    assert_eq!(
        reply.header("Content-Length"),
        Some(content.len().to_string().as_str())
    );
}

#[tokio::test]
async fn test_empty_filename_uses_fallback() {
    let relay = start_relay().await;
    let code = upload(relay.addr, "", b"anonymous").await;

    let mut stream = connect_transfer(code).await;
    let mut received = Vec::new();
    stream.read_to_end(&mut received).await.unwrap();
    assert_eq!(received, b"Filename: unnamed-file\nanonymous");
}

#[tokio::test]
async fn test_path_in_filename_is_stripped() {
    let relay = start_relay().await;
    let code = upload(relay.addr, "C:\\Users\\me\\report.pdf", b"%PDF").await;

    let reply = download(relay.addr, code).await;
    assert_eq!(
        reply.header("Content-Disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );
    assert_eq!(reply.body, b"%PDF");
}

#[tokio::test]
async fn test_uploads_are_stored_separately() {
    let relay = start_relay().await;
    let first = upload(relay.addr, "same.txt", b"one").await;
    let second = upload(relay.addr, "same.txt", b"two").await;

    assert_ne!(first, second);
    assert_eq!(count_entries(&relay.upload_dir), 2);

    assert_eq!(download(relay.addr, second).await.body, b"two");
    assert_eq!(download(relay.addr, first).await.body, b"one");
}

#[tokio::test]
async fn test_concurrent_uploads_get_unique_codes() {
    let relay = start_relay().await;

    let mut tasks = Vec::new();
    for i in 0..20 {
        let addr = relay.addr;
        tasks.push(tokio::spawn(async move {
            upload(addr, &format!("file-{i}.txt"), format!("content {i}").as_bytes()).await
        }));
    }

    let mut codes = HashSet::new();
    for task in tasks {
        assert!(codes.insert(task.await.unwrap()));
    }
    assert_eq!(codes.len(), 20);
    assert_eq!(relay.registry.len(), 20);
}

#[tokio::test]
async fn test_unclaimed_offer_expires() {
    let relay = start_relay_with(|config| {
        config.transfer.accept_timeout = Some(Duration::from_millis(200));
    })
    .await;

    upload(relay.addr, "stale.txt", b"nobody wants me").await;
    assert_eq!(count_entries(&relay.upload_dir), 1);

    for _ in 0..100 {
        if relay.registry.is_empty() && count_entries(&relay.upload_dir) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("offer was not retired after its timeout");
}

// ============================================================================
// Client errors
// ============================================================================

#[tokio::test]
async fn test_unknown_code_is_client_error() {
    let relay = start_relay().await;
    let live = upload(relay.addr, "live.txt", b"still here").await;

    let code = unused_code();
    let reply = send_raw(relay.addr, &request("GET", &format!("/download/{code}"))).await;
    assert_eq!(reply.status, 400);
    assert!(reply.text().starts_with("Error downloading file: "));

    // Other offers are unaffected
    let reply = download(relay.addr, live).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, b"still here");
}

#[tokio::test]
async fn test_invalid_code() {
    let relay = start_relay().await;
    for path in ["/download/abc", "/download/99999", "/download/8080", "/api/download/"] {
        let reply = send_raw(relay.addr, &request("GET", path)).await;
        assert_eq!(reply.status, 400, "{path}");
        assert_eq!(reply.text(), "Bad Request: Invalid port number");
    }
}

#[tokio::test]
async fn test_download_of_gateway_port_is_rejected() {
    // One worker: a fetch looping back to the gateway could never be served
    let relay = start_relay_with(|config| {
        config.workers = 1;
        config.peer_timeout = Duration::from_millis(300);
    })
    .await;

    let path = format!("/download/{}", relay.addr.port());
    let reply = tokio::time::timeout(
        Duration::from_secs(3),
        send_raw(relay.addr, &request("GET", &path)),
    )
    .await
    .expect("download of the gateway's own port hung");
    assert_eq!(reply.status, 400);

    // The worker is free again
    let reply = send_raw(relay.addr, &request("GET", "/nope")).await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn test_upload_requires_multipart() {
    let relay = start_relay().await;
    let reply = send_raw(relay.addr, &post("/upload", "application/json", b"{}")).await;

    assert_eq!(reply.status, 400);
    assert_eq!(
        reply.text(),
        "Bad Request: Content-Type must be multipart/form-data"
    );
    assert!(relay.registry.is_empty());
}

#[tokio::test]
async fn test_unparseable_upload() {
    let relay = start_relay().await;
    let content_type = format!("{MULTIPART_FORM_DATA}; boundary=XYZ123");

    // No filename marker
    let body = b"--XYZ123\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--XYZ123--\r\n";
    let reply = send_raw(relay.addr, &post("/upload", &content_type, body)).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.text(), "Bad Request: Could not parse file content");

    // No boundary parameter
    let body = multipart_body("XYZ123", "a.txt", "text/plain", b"abc");
    let reply = send_raw(relay.addr, &post("/upload", MULTIPART_FORM_DATA, &body)).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.text(), "Bad Request: Could not parse file content");

    assert!(relay.registry.is_empty());
    assert_eq!(count_entries(&relay.upload_dir), 0);
}

#[tokio::test]
async fn test_chunked_upload_rejected() {
    let relay = start_relay().await;
    let reply = send_raw(
        relay.addr,
        b"POST /upload HTTP/1.1\r\nHost: localhost\r\nTransfer-Encoding: chunked\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 411);
}

#[tokio::test]
async fn test_oversized_upload_rejected() {
    let relay = start_relay_with(|config| config.max_upload_size = 1024).await;
    let reply = send_raw(
        relay.addr,
        b"POST /upload HTTP/1.1\r\nHost: localhost\r\nContent-Type: multipart/form-data; boundary=b\r\nContent-Length: 4096\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 413);
    assert!(relay.registry.is_empty());
}

// ============================================================================
// Routing and CORS
// ============================================================================

#[tokio::test]
async fn test_routing() {
    let relay = start_relay().await;

    let reply = send_raw(relay.addr, &request("GET", "/")).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.text(), "Not Found");

    let reply = send_raw(relay.addr, &request("GET", "/upload")).await;
    assert_eq!(reply.status, 405);

    let reply = send_raw(relay.addr, &request("DELETE", "/download/50000")).await;
    assert_eq!(reply.status, 405);
}

#[tokio::test]
async fn test_api_prefix() {
    let relay = start_relay().await;
    let body = multipart_body("XYZ123", "api.txt", "text/plain", b"via api");
    let reply = send_raw(
        relay.addr,
        &post("/api/upload", "multipart/form-data; boundary=XYZ123", &body),
    )
    .await;
    assert_eq!(reply.status, 200);
}

#[tokio::test]
async fn test_cors_headers() {
    let relay = start_relay().await;

    let reply = send_raw(relay.addr, &request("OPTIONS", "/api/upload")).await;
    assert_eq!(reply.status, 204);
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(
        reply.header("Access-Control-Allow-Methods"),
        Some("GET, POST, OPTIONS")
    );
    assert_eq!(
        reply.header("Access-Control-Allow-Headers"),
        Some("Content-Type, Authorization")
    );
    assert!(reply.body.is_empty());

    // Error responses carry the origin header too
    let reply = send_raw(relay.addr, &request("GET", "/missing")).await;
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
}

#[tokio::test]
async fn test_malformed_request() {
    let relay = start_relay().await;
    let reply = send_raw(relay.addr, b"NONSENSE\r\n\r\n").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.header("Connection"), Some("close"));
}

// ============================================================================
// Connection limits
// ============================================================================

#[tokio::test]
async fn test_idle_clients_do_not_block_requests() {
    let relay = start_relay_with(|config| {
        config.workers = 2;
        config.idle_timeout = Duration::from_millis(200);
    })
    .await;

    // Connected but silent, holding every worker
    let _idle_a = TcpStream::connect(relay.addr).await.unwrap();
    let _idle_b = TcpStream::connect(relay.addr).await.unwrap();

    let reply = tokio::time::timeout(
        Duration::from_secs(3),
        send_raw(relay.addr, &request("GET", "/nope")),
    )
    .await
    .expect("request starved by idle connections");
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn test_stalled_request_times_out() {
    let relay = start_relay_with(|config| {
        config.request_timeout = Duration::from_millis(200);
    })
    .await;

    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    stream
        .write_all(b"POST /upload HTTP/1.1\r\nContent-Length: 100\r\n\r\npartial")
        .await
        .unwrap();

    let mut raw = Vec::new();
    tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut raw))
        .await
        .expect("stalled request was never answered")
        .unwrap();
    assert!(String::from_utf8_lossy(&raw).starts_with("HTTP/1.1 408 "));
}
