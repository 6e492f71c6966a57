//! In-process HTTP server for exercising the transports.
//!
//! Every accepted connection gets the same canned response, sent with
//! chunked transfer encoding so the client sees the body in pieces.
use crate::config::ConnectOptions;

use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;


#[derive(Clone, Debug)]
pub(crate) struct ReceivedRequest {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

pub(crate) struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<ReceivedRequest>>>,
}

impl MockServer {
    /// Serve `body` in one chunk with `status`.
    pub(crate) fn start(status: u16, body: &str) -> Self {
        Self::start_chunked(status, vec![body.as_bytes().to_vec()])
    }

    /// Serve the body as the given chunks, flushed one at a time.
    pub(crate) fn start_chunked(status: u16, chunks: Vec<Vec<u8>>) -> Self {
        Self::start_paced(status, chunks, Duration::from_millis(2))
    }

    /// Like [`start_chunked`](Self::start_chunked), sleeping `pause` after each chunk.
    pub(crate) fn start_paced(status: u16, chunks: Vec<Vec<u8>>, pause: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let _ = respond(stream, status, &chunks, pause, &recorded);
            }
        });

        Self { port, requests }
    }

    pub(crate) fn options(&self) -> ConnectOptions {
        ConnectOptions::new()
            .host("127.0.0.1")
            .port(self.port)
            .use_system_proxy(false)
            .timeout(Duration::from_secs(10))
    }

    pub(crate) fn last_request(&self) -> Option<ReceivedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub(crate) fn last_json_body(&self) -> Value {
        let request = self.last_request().expect("no request received");
        serde_json::from_slice(&request.body).expect("request body is JSON")
    }
}

fn respond(
    stream: TcpStream,
    status: u16,
    chunks: &[Vec<u8>],
    pause: Duration,
    recorded: &Mutex<Vec<ReceivedRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;

    // Recorded before responding so tests can inspect it once the client returns.
    recorded.lock().unwrap().push(ReceivedRequest { headers, body });

    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        reason(status)
    )?;
    stream.flush()?;

    for chunk in chunks.iter().filter(|c| !c.is_empty()) {
        write!(stream, "{:x}\r\n", chunk.len())?;
        stream.write_all(chunk)?;
        stream.write_all(b"\r\n")?;
        stream.flush()?;
        thread::sleep(pause);
    }
    stream.write_all(b"0\r\n\r\n")?;
    stream.flush()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
