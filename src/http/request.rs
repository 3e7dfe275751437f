//! Incremental HTTP/1.1 request parser (component H), grounded on the
//! teacher's `src/http/request.rs` state machine shape but pared to
//! the GET/POST register-login surface spec'd for this engine:
//! chunked bodies, multipart, trailers and CGI dispatch are dropped
//! (see `DESIGN.md`).

use std::collections::HashMap;
use std::fmt;

use buffer::Buffer;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsingState {
    RequestLine,
    Header,
    Body,
    Finish,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("unknown or unsupported method")]
    InvalidMethod,
    #[error("malformed header line")]
    MalformedHeader,
    #[error("missing or invalid Content-Length")]
    MissingContentLength,
}

/// Outcome of one `parse` call, mirroring spec.md §4.H's four-way
/// result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    NoRequest,
    GetRequest,
    BadRequest,
    InternalError,
}

const CRLF: &[u8] = b"\r\n";

/// Paths that receive the `.html` suffix treatment described in
/// spec.md §4.H's request-line canonicalization step.
const DEFAULT_HTML_STEMS: &[&str] = &["/index", "/register", "/login", "/welcome", "/video", "/picture"];

#[derive(Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub headers: HashMap<String, String>,
    pub form: HashMap<String, String>,
    pub body: Vec<u8>,
    pub state: ParsingState,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        HttpRequest {
            method: Method::Get,
            path: String::new(),
            version: String::new(),
            headers: HashMap::new(),
            form: HashMap::new(),
            body: Vec::new(),
            state: ParsingState::RequestLine,
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.version == "1.1"
            && self
                .headers
                .get("connection")
                .map(|v| v.eq_ignore_ascii_case("keep-alive"))
                .unwrap_or(false)
    }

    /// Drives the state machine as far as the bytes currently
    /// readable in `buf` allow. Caller is responsible for reinitializing
    /// a request that previously reached `Finish` before calling this
    /// again (so partial requests across read edges resume correctly).
    pub fn parse(&mut self, buf: &mut Buffer) -> ParseOutcome {
        loop {
            match self.state {
                ParsingState::RequestLine => match self.parse_request_line(buf) {
                    Ok(true) => continue,
                    Ok(false) => return ParseOutcome::NoRequest,
                    Err(_) => return ParseOutcome::BadRequest,
                },
                ParsingState::Header => match self.parse_header_line(buf) {
                    Ok(true) => continue,
                    Ok(false) => return ParseOutcome::NoRequest,
                    Err(_) => return ParseOutcome::BadRequest,
                },
                ParsingState::Body => match self.consume_body(buf) {
                    Ok(true) => continue,
                    Ok(false) => return ParseOutcome::NoRequest,
                    Err(_) => return ParseOutcome::BadRequest,
                },
                ParsingState::Finish => return ParseOutcome::GetRequest,
            }
        }
    }

    fn parse_request_line(&mut self, buf: &mut Buffer) -> Result<bool, ParseError> {
        let Some(line) = take_line(buf) else {
            return Ok(false);
        };
        let text = std::str::from_utf8(&line).map_err(|_| ParseError::MalformedRequestLine)?;
        let parts: Vec<&str> = text.split(' ').collect();
        let [method, path, version] = parts.as_slice() else {
            return Err(ParseError::MalformedRequestLine);
        };
        self.method = match *method {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => return Err(ParseError::InvalidMethod),
        };
        self.version = version
            .strip_prefix("HTTP/")
            .ok_or(ParseError::MalformedRequestLine)?
            .to_string();
        self.path = canonicalize_path(path);
        self.state = ParsingState::Header;
        Ok(true)
    }

    fn parse_header_line(&mut self, buf: &mut Buffer) -> Result<bool, ParseError> {
        let Some(line) = take_line(buf) else {
            return Ok(false);
        };
        if line.is_empty() {
            if self.method == Method::Get {
                self.state = ParsingState::Finish;
            } else {
                self.state = ParsingState::Body;
            }
            return Ok(true);
        }
        let text = std::str::from_utf8(&line).map_err(|_| ParseError::MalformedHeader)?;
        let sep = text.find(':').ok_or(ParseError::MalformedHeader)?;
        let key = text[..sep].trim().to_ascii_lowercase();
        let rest = &text[sep + 1..];
        let value = rest.strip_prefix(' ').unwrap_or(rest).to_string();
        self.headers.insert(key, value);
        Ok(true)
    }

    fn consume_body(&mut self, buf: &mut Buffer) -> Result<bool, ParseError> {
        let content_length: usize = self
            .headers
            .get("content-length")
            .and_then(|v| v.parse().ok())
            .ok_or(ParseError::MissingContentLength)?;

        if self.body.len() < content_length {
            let take = std::cmp::min(buf.readable_bytes(), content_length - self.body.len());
            if take > 0 {
                self.body.extend_from_slice(&buf.begin_read()[..take]);
                buf.has_read(take);
            }
        }

        if self.body.len() < content_length {
            return Ok(false);
        }

        if self
            .headers
            .get("content-type")
            .map(|v| v == "application/x-www-form-urlencoded")
            .unwrap_or(false)
        {
            self.decode_form();
        }
        self.state = ParsingState::Finish;
        Ok(true)
    }

    fn decode_form(&mut self) {
        let body = String::from_utf8_lossy(&self.body).into_owned();
        for pair in body.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = match pair.find('=') {
                Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                None => (pair, ""),
            };
            self.form
                .insert(percent_decode(key), percent_decode(value));
        }
    }
}

fn canonicalize_path(path: &str) -> String {
    if path == "/" {
        return "/index.html".to_string();
    }
    if DEFAULT_HTML_STEMS.contains(&path) {
        return format!("{}.html", path);
    }
    path.to_string()
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                if let Ok(byte) = u8::from_str_radix(
                    std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or(""),
                    16,
                ) {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(bytes[i]);
                    i += 1;
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Pulls one CRLF-terminated line out of the readable region,
/// consuming the line and its trailing CRLF. Returns `None` (without
/// consuming anything) when no full line is available yet.
fn take_line(buf: &mut Buffer) -> Option<Vec<u8>> {
    let relative_end = find_subsequence(buf.begin_read(), CRLF)?;
    // begin_read() is the window [read_pos, write_pos), so the line's
    // absolute end is read_pos (== prependable_bytes()) + relative_end.
    let absolute_end = buf.prependable_bytes() + relative_end;
    let line = buf.retrieve_until(absolute_end);
    buf.has_read(CRLF.len());
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buf: &mut Buffer, data: &[u8]) {
        buf.append(data);
    }

    #[test]
    fn parses_simple_get() {
        let mut buf = Buffer::new();
        feed(&mut buf, b"GET / HTTP/1.1\r\nHost: x\r\nConnection: keep-alive\r\n\r\n");
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
        assert_eq!(req.path, "/index.html");
        assert!(req.is_keep_alive());
    }

    #[test]
    fn partial_request_line_yields_no_request() {
        let mut buf = Buffer::new();
        feed(&mut buf, b"GET / HT");
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
        assert_eq!(req.state, ParsingState::RequestLine);
    }

    #[test]
    fn unknown_method_is_bad_request() {
        let mut buf = Buffer::new();
        feed(&mut buf, b"FETCH / HTTP/1.1\r\n\r\n");
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::BadRequest);
    }

    #[test]
    fn post_waits_for_full_body_then_decodes_form() {
        let mut buf = Buffer::new();
        feed(
            &mut buf,
            b"POST /login.html HTTP/1.1\r\nContent-Length: 27\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nusername=alice&password=pw1",
        );
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
        assert_eq!(req.form.get("username").map(String::as_str), Some("alice"));
        assert_eq!(req.form.get("password").map(String::as_str), Some("pw1"));
    }

    #[test]
    fn post_body_split_across_reads_resumes() {
        let mut buf = Buffer::new();
        feed(
            &mut buf,
            b"POST /register.html HTTP/1.1\r\nContent-Length: 10\r\n\r\nabcde",
        );
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::NoRequest);
        assert_eq!(req.state, ParsingState::Body);
        feed(&mut buf, b"fghij");
        assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
        assert_eq!(req.body, b"abcdefghij");
    }

    #[test]
    fn root_path_canonicalizes_to_index() {
        assert_eq!(canonicalize_path("/"), "/index.html");
        assert_eq!(canonicalize_path("/login"), "/login.html");
        assert_eq!(canonicalize_path("/other"), "/other");
    }

    #[test]
    fn percent_decode_handles_plus_and_hex() {
        assert_eq!(percent_decode("a+b%20c"), "a b c");
    }

    #[test]
    fn header_value_keeps_extra_leading_spaces() {
        let mut buf = Buffer::new();
        feed(&mut buf, b"GET / HTTP/1.1\r\nX-Pad:   three\r\n\r\n");
        let mut req = HttpRequest::new();
        assert_eq!(req.parse(&mut buf), ParseOutcome::GetRequest);
        assert_eq!(req.headers.get("x-pad").unwrap(), "  three");
    }
}
