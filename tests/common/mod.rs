//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prediction_proxy::config::ProxyConfig;
use prediction_proxy::http::HttpServer;
use prediction_proxy::lifecycle::Shutdown;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// A request as seen by the mock ML service.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

/// Start a programmable mock ML service.
///
/// The handler sees each parsed request and returns a status and JSON body.
pub async fn start_ml_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let (mut reader, mut writer) = socket.into_split();
                        let Some(request) = read_request(&mut reader).await else {
                            return;
                        };
                        let (status, body) = f(request).await;

                        let response = format!(
                            "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            body.len(),
                            body
                        );
                        let _ = writer.write_all(response.as_bytes()).await;
                        let _ = writer.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

async fn read_request(reader: &mut tokio::net::tcp::OwnedReadHalf) -> Option<MockRequest> {
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await.ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim().to_string();
            let value = value.trim().to_string();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse().unwrap_or(0);
            }
            headers.push((name, value));
        }
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(MockRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// A well-formed ML prediction body.
pub fn prediction_json(prediction: &str, home: f64, draw: f64, away: f64) -> String {
    let confidence = home.max(draw).max(away);
    json!({
        "prediction": prediction,
        "confidence": confidence,
        "probabilities": { "home": home, "draw": draw, "away": away },
        "model_version": "test-model-1",
    })
    .to_string()
}

/// A valid public prediction request body.
pub fn fixture_body(enable_ai: bool) -> Value {
    json!({
        "homeTeam": "Arsenal",
        "awayTeam": "Chelsea",
        "features": [1.8, 1.1, 0.62, 0.48, 3.0, 1.0, 0.55],
        "enableAI": enable_ai,
    })
}

/// Config pointing at `ml_addr`, listening on `proxy_addr`, with rate limiting off.
pub fn proxy_config(proxy_addr: SocketAddr, ml_addr: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = proxy_addr.to_string();
    config.upstream.base_url = format!("http://{}", ml_addr);
    config.rate_limit.enabled = false;
    config
}

/// Start the proxy and wait until it accepts connections.
pub async fn start_proxy(config: ProxyConfig) -> Shutdown {
    let (_tx, config_updates) = mpsc::unbounded_channel();
    start_proxy_with_updates(config, config_updates).await
}

pub async fn start_proxy_with_updates(
    config: ProxyConfig,
    config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
) -> Shutdown {
    let proxy_addr: SocketAddr = config.listener.bind_address.parse().unwrap();
    let admin_addr: Option<SocketAddr> = config
        .admin
        .enabled
        .then(|| config.admin.bind_address.parse().unwrap());

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    let listener = TcpListener::bind(proxy_addr).await.unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    if let Some(admin_addr) = admin_addr {
        wait_for_listener(admin_addr).await;
    }
    shutdown
}

async fn wait_for_listener(addr: SocketAddr) {
    for _ in 0..50 {
        if TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("listener {addr} never came up");
}

/// A client that never reuses connections between requests.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
