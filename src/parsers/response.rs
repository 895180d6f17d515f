//! HTTP response rendering.
//!
//! Turns a gate [`Decision`] (or one of the fixed error replies) into the
//! bytes written back to the client. Every response is framed with
//! `Content-Length` and `Connection: close`; the gate serves one request per
//! connection.

use crate::gate::Decision;
use std::io::Write;

/// An HTTP/1.1 response ready to be written to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Render the gate's decision.
    ///
    /// Blocked requests get `200 OK`, the configured headers and the
    /// configured body, with `Content-Type: text/html` replacing any
    /// configured content type. Everything else gets a redirect with a
    /// short HTML body linking to the target.
    pub fn from_decision(decision: &Decision<'_>) -> Self {
        match decision {
            Decision::Blocked { headers, body, .. } => {
                let mut rendered: Vec<(String, String)> = headers
                    .iter()
                    .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                rendered.push(("Content-Type".to_string(), "text/html".to_string()));

                HttpResponse {
                    status_code: 200,
                    headers: rendered,
                    body: body.to_string(),
                }
            }
            Decision::Redirect { url, status } => HttpResponse {
                status_code: *status,
                headers: vec![
                    ("Location".to_string(), url.to_string()),
                    ("Content-Type".to_string(), "text/html; charset=utf-8".to_string()),
                ],
                body: format!(
                    "<a href=\"{}\">{}</a>.\n\n",
                    html_escape(url),
                    status_text(*status)
                ),
            },
        }
    }

    pub fn not_found() -> Self {
        Self::plain(404, "404 page not found")
    }

    pub fn bad_request() -> Self {
        Self::plain(400, "Bad Request")
    }

    fn plain(status_code: u16, body: &str) -> Self {
        HttpResponse {
            status_code,
            headers: vec![("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())],
            body: body.to_string(),
        }
    }

    /// Serialize status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.body.len());
        // Writing into a Vec can't fail.
        let _ = write!(
            out,
            "HTTP/1.1 {} {}\r\n",
            self.status_code,
            status_text(self.status_code)
        );
        for (name, value) in &self.headers {
            let _ = write!(out, "{}: {}\r\n", name, value);
        }
        let _ = write!(
            out,
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        );
        out.extend_from_slice(self.body.as_bytes());
        out
    }
}

/// Reason phrase for the status codes the gate can emit.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "",
    }
}

fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
