//! Local relay that forwards `/api/mangadex?path=…` to the catalog API so
//! browser-side code can call it from the same origin.

use log::{error, info, warn};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Settings;

pub const ROUTE: &str = "/api/mangadex";
const MAX_HEAD_BYTES: usize = 64 * 1024;
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, body: &Value) -> Self {
        HttpResponse {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let reason = StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown");
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, reason);
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}\r\n", name, value));
        }
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n\r\n");
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Splits a request target into its path and the `path` routing parameter,
/// keeping every other query pair exactly as received.
pub fn split_target(target: &str) -> (&str, String, Vec<&str>) {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let mut route = String::new();
    let mut forward = Vec::new();

    for raw in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = raw.split_once('=').unwrap_or((raw, ""));
        let key = urlencoding::decode(key).map(|k| k.into_owned()).unwrap_or_default();
        if key == "path" {
            let value = value.replace('+', " ");
            route = urlencoding::decode(&value)
                .map(|v| v.into_owned())
                .unwrap_or_default();
        } else {
            forward.push(raw);
        }
    }

    (path, route, forward)
}

pub fn upstream_url(api_base: &str, route: &str, forward: &[&str]) -> String {
    if forward.is_empty() {
        format!("{}{}", api_base, route)
    } else {
        format!("{}{}?{}", api_base, route, forward.join("&"))
    }
}

#[derive(Clone)]
pub struct Relay {
    http: reqwest::Client,
    api_base: String,
}

impl Relay {
    pub fn new(settings: &Settings) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            api_base: settings.api_base_url.clone(),
        })
    }

    pub async fn respond(&self, request: &HttpRequest) -> HttpResponse {
        let (path, route, forward) = split_target(&request.target);
        if path != ROUTE {
            return HttpResponse::json(404, &json!({ "error": "not_found" }));
        }

        match request.method.as_str() {
            "GET" => {
                let url = upstream_url(&self.api_base, &route, &forward);
                info!("proxying GET {}", url);
                match self.forward(self.http.get(&url)).await {
                    Ok((status, body)) => HttpResponse::json(status, &body)
                        .with_header("Cache-Control", "no-cache, no-store, must-revalidate"),
                    Err(e) => {
                        error!("API proxy error: {}", e);
                        HttpResponse::json(
                            500,
                            &json!({ "error": "Failed to fetch data from MangaDex API" }),
                        )
                    }
                }
            }
            "POST" => {
                let url = upstream_url(&self.api_base, &route, &[]);
                info!("proxying POST {}", url);
                let result = match serde_json::from_slice::<Value>(&request.body) {
                    Ok(body) => self.forward(self.http.post(&url).json(&body)).await,
                    Err(e) => Err(format!("invalid request body: {}", e)),
                };
                match result {
                    Ok((status, body)) => HttpResponse::json(status, &body),
                    Err(e) => {
                        error!("API proxy error: {}", e);
                        HttpResponse::json(
                            500,
                            &json!({ "error": "Failed to post data to MangaDex API" }),
                        )
                    }
                }
            }
            _ => HttpResponse::json(405, &json!({ "error": "method_not_allowed" }))
                .with_header("Allow", "GET, POST"),
        }
    }

    async fn forward(&self, request: reqwest::RequestBuilder) -> Result<(u16, Value), String> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.map_err(|e| e.to_string())?;
        Ok((status, body))
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parses the request line and `Content-Length` out of a request head.
pub fn parse_head(head: &str) -> Result<(String, String, usize), String> {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or("empty request")?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or("missing method")?.to_string();
    let target = parts.next().ok_or("missing target")?.to_string();

    let mut content_length = 0;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value
                    .trim()
                    .parse()
                    .map_err(|_| format!("bad content-length: {}", value.trim()))?;
            }
        }
    }

    Ok((method, target, content_length))
}

async fn read_request(stream: &mut TcpStream) -> Result<HttpRequest, String> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(idx) = find_head_end(&buf) {
            break idx;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err("request header too large".to_string());
        }
        let n = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            return Err("incomplete http request".to_string());
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let (method, target, content_length) = parse_head(&head)?;
    if content_length > MAX_BODY_BYTES {
        return Err("request body too large".to_string());
    }

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.map_err(|e| e.to_string())?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok(HttpRequest { method, target, body })
}

async fn handle_connection(mut stream: TcpStream, relay: Arc<Relay>) {
    let response = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(request)) => relay.respond(&request).await,
        Ok(Err(e)) => {
            warn!("bad request: {}", e);
            HttpResponse::json(400, &json!({ "error": "bad_request" }))
        }
        Err(_) => {
            warn!("request read timed out");
            return;
        }
    };

    if let Err(e) = stream.write_all(&response.to_bytes()).await {
        warn!("write failed: {}", e);
    }
    let _ = stream.shutdown().await;
}

/// Accepts connections forever, one task per connection.
pub async fn run(listener: TcpListener, relay: Relay) -> io::Result<()> {
    let relay = Arc::new(relay);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("accept error: {}", e);
                continue;
            }
        };
        log::debug!("connection from {}", peer);
        tokio::spawn(handle_connection(stream, relay.clone()));
    }
}

pub async fn serve(settings: &Settings, listen: &str) -> io::Result<()> {
    let relay = Relay::new(settings).map_err(io::Error::other)?;
    let listener = TcpListener::bind(listen).await?;
    info!(
        "proxying {} -> {} on http://{}",
        ROUTE,
        settings.api_base_url,
        listener.local_addr()?
    );
    run(listener, relay).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[test]
    fn routing_parameter_is_stripped() {
        let (path, route, forward) =
            split_target("/api/mangadex?path=%2Fmanga&limit=5&contentRating[]=safe&title=one+piece");
        assert_eq!(path, "/api/mangadex");
        assert_eq!(route, "/manga");
        assert_eq!(forward, vec!["limit=5", "contentRating[]=safe", "title=one+piece"]);
        assert_eq!(
            upstream_url("https://api.mangadex.org", &route, &forward),
            "https://api.mangadex.org/manga?limit=5&contentRating[]=safe&title=one+piece"
        );
    }

    #[test]
    fn missing_path_targets_the_api_root() {
        let (_, route, forward) = split_target("/api/mangadex");
        assert_eq!(route, "");
        assert!(forward.is_empty());
        assert_eq!(upstream_url("https://api.mangadex.org", &route, &forward), "https://api.mangadex.org");
    }

    #[test]
    fn parses_request_head() {
        let (method, target, len) =
            parse_head("POST /api/mangadex?path=/auth HTTP/1.1\r\nHost: x\r\ncontent-length: 17").unwrap();
        assert_eq!(method, "POST");
        assert_eq!(target, "/api/mangadex?path=/auth");
        assert_eq!(len, 17);
        assert!(parse_head("").is_err());
        assert!(parse_head("GET / HTTP/1.1\r\nContent-Length: lots").is_err());
    }

    #[test]
    fn response_bytes_carry_status_and_length() {
        let response = HttpResponse::json(404, &json!({"error": "not_found"}));
        let text = String::from_utf8(response.to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Length: 21\r\n"));
        assert!(text.ends_with("{\"error\":\"not_found\"}"));
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let relay = Relay::new(&Settings::default()).unwrap();
        let not_found = relay
            .respond(&HttpRequest {
                method: "GET".into(),
                target: "/elsewhere".into(),
                body: Vec::new(),
            })
            .await;
        assert_eq!(not_found.status, 404);

        let not_allowed = relay
            .respond(&HttpRequest {
                method: "DELETE".into(),
                target: "/api/mangadex?path=/manga".into(),
                body: Vec::new(),
            })
            .await;
        assert_eq!(not_allowed.status, 405);
    }

    /// Answers one request with a canned 404 and reports the request line.
    async fn fake_upstream() -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await.unwrap();
            let _ = tx.send(format!("{} {}", request.method, request.target));
            let body = r#"{"result":"error","errors":[]}"#;
            let reply = format!(
                "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;
        });
        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn relays_upstream_status_and_body() {
        let (upstream, seen) = fake_upstream().await;
        let settings = Settings {
            api_base_url: upstream,
            ..Settings::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(run(listener, Relay::new(&settings).unwrap()));

        let response = reqwest::get(format!("http://{}/api/mangadex?path=/manga/none&limit=5", addr))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        assert_eq!(
            response.headers()["cache-control"],
            "no-cache, no-store, must-revalidate"
        );
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["result"], "error");

        assert_eq!(seen.await.unwrap(), "GET /manga/none?limit=5");
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_500() {
        let settings = Settings {
            api_base_url: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        let relay = Relay::new(&settings).unwrap();
        let response = relay
            .respond(&HttpRequest {
                method: "POST".into(),
                target: "/api/mangadex?path=/auth/login".into(),
                body: b"{\"username\":\"x\"}".to_vec(),
            })
            .await;
        assert_eq!(response.status, 500);
        assert_eq!(
            String::from_utf8(response.body).unwrap(),
            r#"{"error":"Failed to post data to MangaDex API"}"#
        );
    }
}
