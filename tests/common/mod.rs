//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// A request as seen by the mock ledger service.
#[derive(Debug, Clone, Default)]
pub struct MockRequest {
    pub method: String,
    /// Path without the leading slash or query string.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Decoded `application/x-www-form-urlencoded` body.
    pub form: Vec<(String, String)>,
}

impl MockRequest {
    /// Look up a form or query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .chain(self.query.iter())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What the mock does with a connection.
pub enum Reply {
    /// Respond with a status and body.
    Http(u16, String),
    /// Close the socket without responding.
    Hangup,
}

impl Reply {
    pub fn json(body: serde_json::Value) -> Self {
        Reply::Http(200, body.to_string())
    }
}

/// Start a programmable mock ledger service on an ephemeral port.
pub async fn start_ledger_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Reply> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let _ = serve_connection(socket, f.as_ref()).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn serve_connection<F, Fut>(mut socket: TcpStream, f: &F) -> std::io::Result<()>
where
    F: Fn(MockRequest) -> Fut,
    Fut: Future<Output = Reply>,
{
    let Some(request) = read_request(&mut socket).await? else {
        return Ok(());
    };

    match f(request).await {
        Reply::Http(status, body) => {
            let status_text = match status {
                200 => "200 OK",
                400 => "400 Bad Request",
                404 => "404 Not Found",
                500 => "500 Internal Server Error",
                503 => "503 Service Unavailable",
                _ => "200 OK",
            };
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_text,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Reply::Hangup => drop(socket),
    }
    Ok(())
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<MockRequest>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (body_start + content_length).min(buf.len());
    let body = &buf[body_start..body_end];

    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    };

    Ok(Some(MockRequest {
        method,
        path: path.trim_start_matches('/').to_string(),
        query: url::form_urlencoded::parse(query.as_bytes()).into_owned().collect(),
        headers,
        form: url::form_urlencoded::parse(body).into_owned().collect(),
    }))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Adapter config pointing at the mock service on `addr`, with short retry delays.
pub fn ledger_config(addr: SocketAddr) -> xpay_adapter::config::AdapterConfig {
    let mut config = xpay_adapter::config::AdapterConfig::default();
    config.ledger.server_api = format!("http://{}/api", addr);
    config.ledger.request_timeout_secs = 5;
    config.retries.base_delay_ms = 10;
    config.retries.max_delay_ms = 50;
    config
}
