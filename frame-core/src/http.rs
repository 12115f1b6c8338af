//! Simple HTTP/1.1 client for no_std environments
//!
//! Provides GET and POST requests with streaming response body support over
//! any `embedded_io_async` stream. Every request uses `Connection: close`.

use core::fmt::Write as FmtWrite;
use core::str;

use embedded_io_async::{Read, Write};
use heapless::String;

use crate::download::BodySink;

/// Longest request path (base path + endpoint path + query)
pub const MAX_PATH_LEN: usize = 192;

/// Longest `Last-Modified` value kept from a response
pub const MAX_VALIDATOR_LEN: usize = 40;

/// HTTP client error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// Failed to connect to server
    Connect,
    /// Hostname could not be resolved
    Dns,
    /// Request did not complete in time
    Timeout,
    /// Failed to write request
    Write,
    /// Failed to read response
    Read,
    /// Invalid URL format
    InvalidUrl,
    /// Response parsing error
    Parse,
    /// HTTP error status code
    Status(u16),
    /// Request or response headers too large
    TooLarge,
    /// Scheme or transfer encoding the client cannot speak
    Unsupported,
}

/// URL scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

/// Parsed URL components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Url<'a> {
    pub scheme: Scheme,
    pub host: &'a str,
    pub port: u16,
    pub path: &'a str,
}

impl<'a> Url<'a> {
    /// Parse a URL string into components
    /// Supports: http://host:port/path, https://host:port/path
    pub fn parse(url: &'a str) -> Result<Self, HttpError> {
        // Determine scheme and strip prefix
        let (scheme, rest) = if let Some(rest) = url.strip_prefix("https://") {
            (Scheme::Https, rest)
        } else if let Some(rest) = url.strip_prefix("http://") {
            (Scheme::Http, rest)
        } else {
            return Err(HttpError::InvalidUrl);
        };

        let default_port = match scheme {
            Scheme::Http => 80,
            Scheme::Https => 443,
        };

        // Find path separator
        let (host_port, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        // Parse host and optional port
        let (host, port) = match host_port.find(':') {
            Some(idx) => {
                let port_str = &host_port[idx + 1..];
                let port = port_str.parse().map_err(|_| HttpError::InvalidUrl)?;
                (&host_port[..idx], port)
            }
            None => (host_port, default_port),
        };

        if host.is_empty() {
            return Err(HttpError::InvalidUrl);
        }

        Ok(Url {
            scheme,
            host,
            port,
            path,
        })
    }

    /// Same host and port with a different path
    pub fn with_path<'b>(&self, path: &'b str) -> Url<'b>
    where
        'a: 'b,
    {
        Url {
            scheme: self.scheme,
            host: self.host,
            port: self.port,
            path,
        }
    }
}

/// Append an endpoint path to the base path of the server URL
///
/// `join_path("/frame/", "/api/x")` gives `/frame/api/x`.
pub fn join_path(base: &str, path: &str) -> Result<String<MAX_PATH_LEN>, HttpError> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    let mut joined: String<MAX_PATH_LEN> = String::new();
    write!(&mut joined, "{}/{}", base, path).map_err(|_| HttpError::TooLarge)?;
    Ok(joined)
}

/// Request method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A request without a body
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub method: Method,
    pub url: Url<'a>,
    /// Extra headers, e.g. `If-Modified-Since`
    pub headers: &'a [(&'a str, &'a str)],
}

impl<'a> Request<'a> {
    pub fn new(method: Method, url: Url<'a>) -> Self {
        Self {
            method,
            url,
            headers: &[],
        }
    }

    pub fn with_headers(mut self, headers: &'a [(&'a str, &'a str)]) -> Self {
        self.headers = headers;
        self
    }

    /// Serialize the request line and headers
    fn encode(&self, out: &mut String<512>) -> Result<(), HttpError> {
        let url = &self.url;
        write!(out, "{} {} HTTP/1.1\r\nHost: {}", self.method.as_str(), url.path, url.host)
            .map_err(|_| HttpError::TooLarge)?;
        if url.port != 80 {
            write!(out, ":{}", url.port).map_err(|_| HttpError::TooLarge)?;
        }
        out.push_str("\r\nConnection: close\r\nUser-Agent: spectra-frame\r\n")
            .map_err(|_| HttpError::TooLarge)?;
        if self.method == Method::Post {
            out.push_str("Content-Length: 0\r\n")
                .map_err(|_| HttpError::TooLarge)?;
        }
        for (name, value) in self.headers {
            write!(out, "{}: {}\r\n", name, value).map_err(|_| HttpError::TooLarge)?;
        }
        out.push_str("\r\n").map_err(|_| HttpError::TooLarge)
    }
}

/// HTTP response headers and body accounting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_length: Option<usize>,
    pub last_modified: Option<String<MAX_VALIDATOR_LEN>>,
    pub body_read: usize,
}

impl Response {
    /// Create a new response from parsed headers
    pub fn new(status: u16, content_length: Option<usize>) -> Self {
        Self {
            status,
            content_length,
            last_modified: None,
            body_read: 0,
        }
    }

    /// Get remaining body bytes to read
    pub fn remaining(&self) -> Option<usize> {
        self.content_length
            .map(|len| len.saturating_sub(self.body_read))
    }

    /// Whether the status forbids a message body (204, 304, 1xx)
    pub fn has_no_body(&self) -> bool {
        self.status == 204 || self.status == 304 || (100..200).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// Perform an HTTP request and stream the response body into `sink`
///
/// `rx_buf` holds the response headers and is reused for body chunks.
/// Status codes of 400 and above are returned as [`HttpError::Status`].
pub async fn send<S, B>(
    socket: &mut S,
    request: &Request<'_>,
    rx_buf: &mut [u8],
    sink: &mut B,
) -> Result<Response, HttpError>
where
    S: Read + Write,
    B: BodySink,
{
    // Build request
    let mut head: String<512> = String::new();
    request.encode(&mut head)?;

    // Send request
    socket
        .write_all(head.as_bytes())
        .await
        .map_err(|_| HttpError::Write)?;
    socket.flush().await.map_err(|_| HttpError::Write)?;

    // Read until we find \r\n\r\n
    let mut total_read = 0;
    let headers_end = loop {
        if total_read >= rx_buf.len() {
            return Err(HttpError::TooLarge);
        }

        let n = socket
            .read(&mut rx_buf[total_read..])
            .await
            .map_err(|_| HttpError::Read)?;

        if n == 0 {
            return Err(HttpError::Read);
        }

        total_read += n;

        if let Some(pos) = find_header_end(&rx_buf[..total_read]) {
            break pos;
        }
    };

    let header_str = str::from_utf8(&rx_buf[..headers_end]).map_err(|_| HttpError::Parse)?;

    let status = parse_status(header_str)?;
    let content_length = parse_header(header_str, "content-length").and_then(|v| v.parse().ok());
    let mut response = Response::new(status, content_length);
    if let Some(value) = parse_header(header_str, "last-modified") {
        let mut validator = String::new();
        // Values that do not fit are not kept
        if validator.push_str(value).is_ok() {
            response.last_modified = Some(validator);
        }
    }

    if status >= 400 {
        return Err(HttpError::Status(status));
    }

    if response.has_no_body() {
        return Ok(response);
    }

    // Chunk framing would land in the sink as payload
    if parse_header(header_str, "transfer-encoding").is_some_and(is_chunked) {
        return Err(HttpError::Unsupported);
    }

    sink.begin(content_length);

    // Process any body data already read
    let body_start = headers_end + 4;
    let mut wants_more = true;
    if total_read > body_start {
        let initial = &rx_buf[body_start..total_read];
        let initial = match response.remaining() {
            Some(remaining) => &initial[..initial.len().min(remaining)],
            None => initial,
        };
        wants_more = sink.write(initial);
        response.body_read += initial.len();
    }

    // Continue reading body
    while wants_more {
        if response.remaining() == Some(0) {
            break;
        }

        let want = match response.remaining() {
            Some(remaining) => remaining.min(rx_buf.len()),
            None => rx_buf.len(),
        };
        let n = socket
            .read(&mut rx_buf[..want])
            .await
            .map_err(|_| HttpError::Read)?;
        if n == 0 {
            break;
        }

        wants_more = sink.write(&rx_buf[..n]);
        response.body_read += n;
    }

    Ok(response)
}

/// Find the position of \r\n\r\n in the buffer
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse HTTP status code from status line
pub fn parse_status(headers: &str) -> Result<u16, HttpError> {
    // HTTP/1.1 200 OK
    let line = headers.lines().next().ok_or(HttpError::Parse)?;
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or(HttpError::Parse)?;
    if !version.starts_with("HTTP/") {
        return Err(HttpError::Parse);
    }
    parts
        .next()
        .ok_or(HttpError::Parse)?
        .parse()
        .map_err(|_| HttpError::Parse)
}

/// Parse a header value (case-insensitive)
pub fn parse_header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    headers
        .lines()
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

fn is_chunked(transfer_encoding: &str) -> bool {
    transfer_encoding
        .split(',')
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Parse a dotted IPv4 literal
pub fn parse_ipv4(host: &str) -> Option<core::net::Ipv4Addr> {
    host.parse().ok()
}
