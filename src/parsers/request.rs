//! HTTP request head parsing.
//!
//! The gate only ever looks at the request line and a couple of headers, so
//! this parser reads the head and ignores anything after it.

use std::collections::HashMap;
use std::io::{BufRead, Read};
use tracing::{debug, warn};

/// Upper bound on the request line plus headers.
pub const MAX_HEAD_BYTES: usize = 1 << 20;

/// Represents a parsed HTTP request head.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub version: String,
    /// Header names are lowercased. The first occurrence of a repeated header wins.
    pub headers: HashMap<String, String>,
}

impl HttpRequest {
    /// Parse an HTTP request head from a buffered reader.
    #[tracing::instrument(skip(reader), level = "debug")]
    pub fn parse<R: BufRead>(reader: &mut R) -> Result<Self, String> {
        let mut lines = Vec::new();
        let mut head_bytes = 0usize;
        debug!("Starting HTTP request parse");

        // Read lines until the empty line that ends the head. Header values may
        // carry obs-text, so lines are read as bytes and decoded lossily.
        loop {
            let mut line = Vec::new();
            let remaining = (MAX_HEAD_BYTES - head_bytes) as u64;
            match reader.by_ref().take(remaining).read_until(b'\n', &mut line) {
                Ok(n) => {
                    head_bytes += n;

                    if !line.ends_with(b"\n") {
                        if head_bytes >= MAX_HEAD_BYTES {
                            return Err(format!("Request head exceeds {} bytes", MAX_HEAD_BYTES));
                        }
                        return Err("Connection closed while reading headers".to_string());
                    }

                    if line == b"\r\n" || line == b"\n" {
                        break;
                    }

                    lines.push(String::from_utf8_lossy(&line).trim_end().to_string());
                }
                Err(e) => {
                    warn!(error = ?e, "Error reading headers");
                    return Err(format!("Error reading headers: {}", e));
                }
            }
        }

        if lines.is_empty() {
            return Err("Empty request".to_string());
        }

        // Parse the request line: "GET /path HTTP/1.1"
        let request_line_parts: Vec<&str> = lines[0].split_whitespace().collect();
        if request_line_parts.len() != 3 {
            return Err("Invalid request line".to_string());
        }

        let method = request_line_parts[0].to_string();
        let path = request_line_parts[1].to_string();
        let version = request_line_parts[2].to_string();
        if !version.starts_with("HTTP/") {
            return Err(format!("Unsupported protocol version: {}", version));
        }
        debug!(%method, %path, %version, header_lines = lines.len() - 1, "Parsed request line");

        let mut headers = HashMap::new();
        for line in &lines[1..] {
            let (key, value) = match line.split_once(':') {
                Some((key, value)) if !key.trim().is_empty() => (key, value),
                _ => return Err(format!("Malformed header line: {:?}", line)),
            };
            headers
                .entry(key.trim().to_lowercase())
                .or_insert_with(|| value.trim().to_string());
        }

        Ok(HttpRequest {
            method,
            path,
            version,
            headers,
        })
    }

    /// Get a specific header value
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// The User-Agent header, or an empty string when the client sent none.
    pub fn user_agent(&self) -> &str {
        self.get_header("user-agent").unwrap_or("")
    }
}
