//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use danger_room::config::DangerRoomConfig;
use danger_room::control::media_type::media_type_for;
use danger_room::{HarnessRegistry, HttpServer, Shutdown};

/// Read one request (head and Content-Length body) off `socket`.
async fn read_request(socket: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break buf.len();
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    (head, body)
}

async fn respond(socket: &mut TcpStream, body: &[u8]) {
    respond_with(socket, &[], body).await;
}

async fn respond_with(socket: &mut TcpStream, extra_headers: &[(&str, &str)], body: &[u8]) {
    let mut head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n",
        body.len()
    );
    for (name, value) in extra_headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("\r\n");
    let _ = socket.write_all(head.as_bytes()).await;
    let _ = socket.write_all(body).await;
    let _ = socket.shutdown().await;
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Start a mock origin that answers every request with `body`.
pub async fn start_origin(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                respond(&mut socket, body.as_bytes()).await;
            });
        }
    });

    addr
}

/// Start a mock origin that answers every request with `body` and
/// `extra_headers` added to its response head.
pub async fn start_origin_with_headers(extra_headers: &'static [(&'static str, &'static str)], body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_request(&mut socket).await;
                respond_with(&mut socket, extra_headers, body.as_bytes()).await;
            });
        }
    });

    addr
}

/// Start a mock origin that answers with the request it received: the head
/// exactly as read off the wire, followed by the body.
pub async fn start_echo_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (head, body) = read_request(&mut socket).await;
                let mut echoed = head.into_bytes();
                echoed.extend_from_slice(&body);
                respond(&mut socket, &echoed).await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Configuration bound to an ephemeral local port.
pub fn test_config() -> DangerRoomConfig {
    let mut config = DangerRoomConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config
}

/// Start the server with the built-in harnesses.
pub async fn start_server() -> (SocketAddr, Shutdown) {
    start_server_with(test_config(), HarnessRegistry::with_builtins()).await
}

/// Start the server with a custom configuration and registry.
pub async fn start_server_with(config: DangerRoomConfig, registry: HarnessRegistry) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::with_registry(config, registry);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });

    (addr, shutdown)
}

/// HTTP client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Post a configuration document for `resource_type` to `control_path`.
pub async fn configure(
    client: &reqwest::Client,
    server: SocketAddr,
    control_path: &str,
    resource_type: &str,
    document: serde_json::Value,
) -> reqwest::Response {
    client
        .post(format!("http://{}{}", server, control_path))
        .header("content-type", media_type_for(resource_type))
        .body(document.to_string())
        .send()
        .await
        .unwrap()
}

/// Read a response body chunk by chunk, returning what arrived and whether
/// the body ended in an error.
pub async fn read_partial(mut res: reqwest::Response) -> (Vec<u8>, bool) {
    let mut received = Vec::new();
    loop {
        match res.chunk().await {
            Ok(Some(chunk)) => received.extend_from_slice(&chunk),
            Ok(None) => return (received, false),
            Err(_) => return (received, true),
        }
    }
}
