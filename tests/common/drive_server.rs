//! Minimal HTTP/1.1 server standing in for the file host in integration tests.
//!
//! Every connection carries one request; the route closure decides the reply.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone)]
pub struct Request {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl Request {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    status: u16,
    reason: &'static str,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    content_length: Option<usize>,
}

impl Reply {
    /// File content with an attachment header, the way the host serves downloads.
    pub fn file(body: &[u8], name: &str) -> Self {
        Reply::status(200, "OK")
            .header("Content-Type", "application/octet-stream")
            .header("Content-Disposition", &format!("attachment; filename=\"{name}\""))
            .body(body)
    }

    pub fn html(page: &str) -> Self {
        Reply::status(200, "OK")
            .header("Content-Type", "text/html; charset=utf-8")
            .body(page.as_bytes())
    }

    pub fn status(status: u16, reason: &'static str) -> Self {
        Reply {
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
            content_length: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    /// Advertises `length` bytes but sends only the body, then closes the
    /// connection, as a host dropping out mid-transfer would.
    pub fn cut_short(mut self, length: usize) -> Self {
        self.content_length = Some(length);
        self
    }
}

/// Starts the server on a background thread and returns its base URL
/// (e.g. "http://127.0.0.1:12345"). It runs until the test process exits.
pub fn start<F>(route: F) -> String
where
    F: Fn(&Request) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let route = Arc::new(route);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let route = Arc::clone(&route);
            thread::spawn(move || handle(stream, route.as_ref()));
        }
    });
    format!("http://127.0.0.1:{port}")
}

/// Base URL of a port nothing listens on.
pub fn unreachable() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn handle<F>(mut stream: TcpStream, route: &F)
where
    F: Fn(&Request) -> Reply,
{
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));

    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => raw.extend_from_slice(&buf[..n]),
        }
    }
    let head = String::from_utf8_lossy(&raw);
    let Some(target) = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
    else {
        return;
    };
    let Ok(url) = Url::parse(&format!("http://localhost{target}")) else {
        return;
    };
    let request = Request {
        path: url.path().to_string(),
        query: url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
    };

    let reply = route(&request);
    let mut out = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reply.reason,
        reply.content_length.unwrap_or(reply.body.len())
    );
    for (name, value) in &reply.headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    out.push_str("\r\n");
    let _ = stream.write_all(out.as_bytes());
    let _ = stream.write_all(&reply.body);
    let _ = stream.flush();
}
