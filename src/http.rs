//! Request and response values exchanged with the HTTP server.
//!
//! The server adapter frames the connection; the domain sees only the
//! method, a percent-decoded path and query, and answers with a status,
//! a content type and a body.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    pub fn from_name(name: &str) -> Self {
        match name {
            "GET" => Self::Get,
            "POST" => Self::Post,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Decoded `key=value` pairs in request order.
    pub query: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// Request target is not an origin-form path (`/...`).
    MalformedTarget,
    /// A `%` escape was truncated, not hex, or decoded to invalid UTF-8.
    BadEncoding,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MalformedTarget => write!(f, "malformed request target"),
            Self::BadEncoding => write!(f, "bad percent-encoding"),
        }
    }
}

impl HttpRequest {
    /// Build from the method and the raw request target (`/path?query`).
    pub fn new(method: Method, target: &str) -> Result<Self, ParseError> {
        if !target.starts_with('/') {
            return Err(ParseError::MalformedTarget);
        }
        let (path, query) = target.split_once('?').unwrap_or((target, ""));
        Ok(Self {
            method,
            path: percent_decode(path)?,
            query: parse_query(query)?,
        })
    }

/// First value for `key`, if present.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Split and decode `a=1&b=two+words`.  Pairs without `=` get an empty value.
pub fn parse_query(query: &str) -> Result<Vec<(String, String)>, ParseError> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            Ok((percent_decode(k)?, percent_decode(v)?))
        })
        .collect()
}

/// Decode `%XX` escapes and `+` (form-encoded space).
pub fn percent_decode(s: &str) -> Result<String, ParseError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).and_then(|b| hex_val(*b));
                let lo = bytes.get(i + 2).and_then(|b| hex_val(*b));
                let (Some(hi), Some(lo)) = (hi, lo) else {
                    return Err(ParseError::BadEncoding);
                };
                out.push((hi << 4) | lo);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| ParseError::BadEncoding)
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Escape text for inclusion in HTML element content or attributes.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn html(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "text/html; charset=utf-8",
            body,
        }
    }

    pub fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body,
        }
    }

    pub fn bad_request() -> Self {
        Self::html(400, String::from("<h1>400 Bad Request</h1>"))
    }

    pub fn not_found() -> Self {
        Self::html(404, String::from("<h1>404 Not Found</h1>"))
    }

    /// Sent when the control loop did not answer in time.
    pub fn unavailable() -> Self {
        Self::html(503, String::from("<h1>503 Service Unavailable</h1>"))
    }

    pub fn reason(&self) -> &'static str {
        match self.status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }
}
