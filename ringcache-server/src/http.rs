//! Front-end HTTP shim, deliberately kept outside the cache core. Hand-rolled
//! over `TcpStream`, in the same spirit as a hand-rolled RESP2 parser: no
//! framework dependency for a three-endpoint shim.
//!
//! - `GET /api/get?key=...` -> `value=<string>\n`
//! - `POST /api/set` (form: `key,value,expire` minutes 0..=4320, `hot`)
//! - `POST /setpeer` (form: `peer`)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ringcache_common::ByteView;
use ringcache_core::{Discovery, Group, PeerRegistry};

use crate::metrics::Metrics;

/// Upper bound on `/api/set`'s `expire` form field, in minutes (3 days).
const MAX_EXPIRE_MINUTES: i64 = 4320;

pub struct FrontEnd {
    pub group: Arc<Group>,
    pub peers: Arc<PeerRegistry>,
    pub discovery: Arc<dyn Discovery>,
    pub metrics: Arc<Metrics>,
}

impl FrontEnd {
    pub async fn serve(self: Arc<Self>, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "front-end http listener started");
        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(err) = this.handle_connection(stream).await {
                    tracing::debug!(%peer_addr, %err, "front-end connection ended");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        let request = match read_request(&mut stream).await? {
            Some(request) => request,
            None => return Ok(()),
        };

        let start = Instant::now();
        self.metrics.record_request_start();
        let response = self.route(&request).await;
        if response.status >= 400 {
            self.metrics.record_error();
        }
        self.metrics.record_request_end(start.elapsed());

        write_response(&mut stream, &response).await?;
        Ok(())
    }

    async fn route(&self, request: &HttpRequest) -> HttpResponse {
        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/api/get") => self.handle_get(request).await,
            ("POST", "/api/set") => self.handle_set(request).await,
            ("POST", "/setpeer") => self.handle_set_peer(request).await,
            _ => HttpResponse::text(404, "not found\n"),
        }
    }

    async fn handle_get(&self, request: &HttpRequest) -> HttpResponse {
        let key = match request.query.get("key") {
            Some(key) if !key.is_empty() => key.clone(),
            _ => return HttpResponse::text(400, "missing \"key\" query parameter\n"),
        };

        match self.group.get(&key).await {
            Ok(view) => HttpResponse::value(view),
            Err(err) if err.is_peer_unreachable() => {
                // A deadline-exceeded peer call drops that peer from the
                // ring and retries once through the loader, rather than
                // failing the request outright.
                self.peers.remove_peer_by_key(&key);
                match self.group.get(&key).await {
                    Ok(view) => HttpResponse::value(view),
                    Err(err) => HttpResponse::text(500, &format!("{err}\n")),
                }
            }
            Err(err) => HttpResponse::text(500, &format!("{err}\n")),
        }
    }

    async fn handle_set(&self, request: &HttpRequest) -> HttpResponse {
        let form = parse_form(&request.body);
        let key = match form.get("key") {
            Some(key) if !key.is_empty() => key.clone(),
            _ => return HttpResponse::text(400, "missing \"key\" form field\n"),
        };
        let value = form.get("value").cloned().unwrap_or_default();

        let expire_minutes: i64 = match form.get("expire").map(|s| s.parse()) {
            Some(Ok(minutes)) => minutes,
            _ => return HttpResponse::text(400, "invalid \"expire\" (minutes, integer)\n"),
        };
        if !(0..=MAX_EXPIRE_MINUTES).contains(&expire_minutes) {
            return HttpResponse::text(
                400,
                &format!("\"expire\" must be between 0 and {MAX_EXPIRE_MINUTES} minutes\n"),
            );
        }

        let hot = match form.get("hot").map(String::as_str) {
            None | Some("") => false,
            Some("true") => true,
            Some("false") => false,
            Some(_) => return HttpResponse::text(400, "invalid \"hot\" (\"true\", \"false\", or empty)\n"),
        };

        let expire = Instant::now() + Duration::from_secs((expire_minutes as u64) * 60);
        let view = ByteView::new(value.into_bytes(), expire);

        match self.group.set(&key, view, hot).await {
            Ok(()) => HttpResponse::text(200, "done\n"),
            Err(err) => HttpResponse::text(500, &format!("{err}\n")),
        }
    }

    async fn handle_set_peer(&self, request: &HttpRequest) -> HttpResponse {
        let form = parse_form(&request.body);
        let peer = match form.get("peer") {
            Some(peer) if !peer.is_empty() => peer.clone(),
            _ => return HttpResponse::text(400, "\"peer\" is not allowed empty\n"),
        };

        match self.discovery.resolve(&peer).await {
            Ok(addr) => {
                let host = addr.split(':').next().unwrap_or(&addr).to_string();
                self.peers.add_peer_host(&host);
                HttpResponse::text(200, &format!("set peer {peer} successful\n"))
            }
            Err(err) => HttpResponse::text(500, &format!("{err}\n")),
        }
    }
}

struct HttpRequest {
    method: String,
    path: String,
    query: HashMap<String, String>,
    body: String,
}

struct HttpResponse {
    status: u16,
    body: Vec<u8>,
}

impl HttpResponse {
    fn text(status: u16, body: &str) -> Self {
        HttpResponse {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    fn value(view: ByteView) -> Self {
        let mut body = b"value=".to_vec();
        body.extend_from_slice(view.as_bytes());
        body.push(b'\n');
        HttpResponse { status: 200, body }
    }

    fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            _ => "Internal Server Error",
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> anyhow::Result<Option<HttpRequest>> {
    let mut buf = Vec::with_capacity(1024);
    let header_end = loop {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
        if buf.len() > 64 * 1024 {
            anyhow::bail!("request headers too large");
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let raw_path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body_bytes = buf[header_end + 4..].to_vec();
    while body_bytes.len() < content_length {
        let mut chunk = vec![0u8; content_length - body_bytes.len()];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body_bytes.extend_from_slice(&chunk[..n]);
    }

    let (path, query_string) = match raw_path.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (raw_path, String::new()),
    };

    Ok(Some(HttpRequest {
        method,
        path,
        query: parse_form(&query_string),
        body: String::from_utf8_lossy(&body_bytes).to_string(),
    }))
}

async fn write_response(stream: &mut TcpStream, response: &HttpResponse) -> anyhow::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason(),
        response.body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    Ok(())
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Parses `application/x-www-form-urlencoded` data (also used for query
/// strings, which share the same `key=value&key=value` shape).
fn parse_form(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        out.insert(percent_decode(key), percent_decode(value));
    }
    out
}

fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_form_bodies() {
        let form = parse_form("key=Tom&value=630&expire=60&hot=");
        assert_eq!(form.get("key").unwrap(), "Tom");
        assert_eq!(form.get("value").unwrap(), "630");
        assert_eq!(form.get("expire").unwrap(), "60");
        assert_eq!(form.get("hot").unwrap(), "");
    }

    #[test]
    fn percent_decodes_reserved_characters() {
        assert_eq!(percent_decode("a%20b+c"), "a b c");
        assert_eq!(percent_decode("100%25"), "100%");
    }
}
