//! Loopback server standing in for the Gemini endpoint in unit tests.

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;

use crate::config::{Config, GeminiConfig};

/// What the server saw for one request.
#[derive(Debug)]
pub struct Seen {
    pub request_line: String,
    pub body: String,
}

impl Seen {
    /// The prompt text of the first user turn.
    pub fn prompt(&self) -> String {
        let value: serde_json::Value = serde_json::from_str(&self.body).unwrap();
        value["contents"][0]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

/// Serves the given `(status, body)` pairs, one per connection.
pub fn serve(replies: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<Seen>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        for (status, body) in replies {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut buf = vec![0u8; content_length];
            reader.read_exact(&mut buf).unwrap();
            seen.push(Seen {
                request_line: request_line.trim().to_string(),
                body: String::from_utf8(buf).unwrap(),
            });

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            stream.flush().unwrap();
        }
        seen
    });
    (base, handle)
}

/// A successful `generateContent` body whose only part is `text`.
pub fn reply(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

pub fn settings(base_url: String) -> GeminiConfig {
    GeminiConfig {
        base_url,
        max_retries: 2,
        retry_delay_seconds: 0,
        timeout_seconds: 10,
        ..GeminiConfig::default()
    }
}

/// Points `config` at `base_url` with a key file written under `dir`.
pub fn point_at(config: &mut Config, base_url: String, dir: &Path) {
    let key_file = dir.join("api_key");
    fs::write(&key_file, "test-key\n").unwrap();
    config.gemini = GeminiConfig {
        api_key_file: Some(key_file),
        ..settings(base_url)
    };
}
