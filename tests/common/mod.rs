//! A tiny HTTP server for integration tests.
//!
//! It answers one request per connection with whatever the handler returns and records every
//! request it receives.
#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// a request as the server received it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// path and query, e.g. `/events?limit=5`
    pub target: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }
}

pub struct MockResponse {
    pub status: u16,
    pub body: String,
    /// announces more body bytes than are sent, so the client fails reading the body
    pub truncated: bool,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        MockResponse::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        MockResponse { status, body: body.into(), truncated: false }
    }

    pub fn truncated(status: u16, body: impl Into<String>) -> Self {
        MockResponse { truncated: true, ..MockResponse::status(status, body) }
    }
}

pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// starts a server on a free local port answering every request with `handler`
    pub fn start<F>(handler: F) -> MockServer
    where
        F: Fn(&RecordedRequest) -> MockResponse + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => continue,
                };
                if let Some(request) = read_request(&stream) {
                    let response = handler(&request);
                    recorded.lock().unwrap().push(request);
                    let _ = write_response(stream, response);
                }
            }
        });

        MockServer { addr, requests }
    }

    /// a server answering every request with `200 OK` and `body`
    pub fn ok(body: &'static str) -> MockServer {
        MockServer::start(move |_| MockResponse::ok(body))
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// the only request received so far
    pub fn single_request(&self) -> RecordedRequest {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected one request, got {:?}", requests);
        requests.into_iter().next().unwrap()
    }
}

fn read_request(stream: &TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0;
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok()?;
            }
        }
    }

    let mut body = vec![0; content_length];
    reader.read_exact(&mut body).ok()?;

    Some(RecordedRequest { method, target, body: String::from_utf8_lossy(&body).into_owned() })
}

fn write_response(mut stream: TcpStream, response: MockResponse) -> std::io::Result<()> {
    let reason = if response.status == 200 { "OK" } else { "Error" };
    let length = response.body.len() + if response.truncated { 64 } else { 0 };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\
         Connection: close\r\n\r\n{}",
        response.status, reason, length, response.body
    )?;
    stream.flush()
}
