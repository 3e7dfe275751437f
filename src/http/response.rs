//! Response builder (component I): status line + headers into a
//! `Buffer`, body served from an `mmap`'d static file, grounded on the
//! teacher's `src/http/response.rs` but trimmed to the four status
//! codes and MIME table spec.md §4.I names.

use std::fs;
use std::io;
use std::path::Path;

use buffer::Buffer;
use memmap2::Mmap;

use crate::config::ServerConfig;

pub const KEEP_ALIVE_VALUE: &str = "timeout=120, max=6";

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        _ => "Bad Request",
    }
}

/// Maps to the normalized status: anything not in `{200, 403, 404}`
/// is reported (and texted) as 400, per spec.md §4.J.2.
fn normalize_status(code: u16) -> u16 {
    match code {
        200 | 403 | 404 => code,
        _ => 400,
    }
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "xml" => "text/xml",
        "xhtml" => "application/xhtml+xml",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "au" => "audio/basic",
        "mpeg" | "mpg" => "video/mpeg",
        "avi" => "video/x-msvideo",
        "gz" => "application/x-gzip",
        "tar" => "application/x-tar",
        "css" => "text/css",
        "js" => "application/javascript",
        _ => "text/plain",
    }
}

enum Body {
    Empty,
    Inline(Vec<u8>),
    Mapped(Mmap),
}

impl Body {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Inline(v) => v,
            Body::Mapped(m) => m,
        }
    }
}

/// A response under construction. `init`/`reinit` drop any previously
/// mapped file (`Body::Mapped`'s `Drop` unmaps it) before the next
/// request reuses the slot.
pub struct HttpResponse {
    status_code: u16,
    keep_alive: bool,
    content_type: &'static str,
    body: Body,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        HttpResponse {
            status_code: 200,
            keep_alive: false,
            content_type: "text/plain",
            body: Body::Empty,
        }
    }

    /// Resets the response to a blank 200 with no body, unmapping any
    /// file the previous request mapped.
    pub fn reinit(&mut self) {
        self.status_code = 200;
        self.keep_alive = false;
        self.content_type = "text/plain";
        self.body = Body::Empty;
    }

    pub fn set_keep_alive(&mut self, keep_alive: bool) {
        self.keep_alive = keep_alive;
    }

    pub fn set_status(&mut self, code: u16) {
        self.status_code = normalize_status(code);
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Maps `path` as the response body via `mmap`, inferring
    /// `Content-Type` from the file suffix. Leaves the response
    /// untouched on I/O failure so the caller can fall back to an
    /// error body.
    pub fn map_file(&mut self, path: &Path) -> io::Result<()> {
        let file = fs::File::open(path)?;
        let mmap = if file.metadata()?.len() == 0 {
            None
        } else {
            Some(unsafe { Mmap::map(&file)? })
        };
        self.content_type = mime_type_for(path);
        self.body = match mmap {
            Some(m) => Body::Mapped(m),
            None => Body::Empty,
        };
        Ok(())
    }

    pub fn set_inline_body(&mut self, body: Vec<u8>, content_type: &'static str) {
        self.content_type = content_type;
        self.body = Body::Inline(body);
    }

    pub fn body_bytes(&self) -> &[u8] {
        self.body.as_bytes()
    }

    /// Resolves the status-specific error page under `s_cfg`'s
    /// configured `error_pages`, falling back to a one-line inline
    /// body when no page is configured or readable.
    pub fn load_error_body(&mut self, s_cfg: &ServerConfig) {
        let code = self.status_code;
        if let Some(rel) = s_cfg.error_pages.get(&code) {
            let path = Path::new(s_cfg.default_root()).join(rel.trim_start_matches('/'));
            if self.map_file(&path).is_ok() {
                return;
            }
        }
        let body = format!("{} {}", code, status_text(code)).into_bytes();
        self.set_inline_body(body, "text/plain");
    }

    /// Appends the status line and headers (not the body) into `buf`.
    /// Callers write `body_bytes()` separately as the second
    /// scatter-gather segment.
    pub fn make_response(&self, buf: &mut Buffer) {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n",
            self.status_code,
            status_text(self.status_code)
        );
        if self.keep_alive {
            head.push_str("Connection: keep-alive\r\n");
            head.push_str(&format!("keep-alive: {}\r\n", KEEP_ALIVE_VALUE));
        } else {
            head.push_str("Connection: close\r\n");
        }
        head.push_str(&format!("Content-type: {}\r\n", self.content_type));
        head.push_str(&format!("Content-length: {}\r\n\r\n", self.body_bytes().len()));
        buf.append(head.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn normalize_status_maps_unknown_to_bad_request() {
        assert_eq!(normalize_status(200), 200);
        assert_eq!(normalize_status(404), 404);
        assert_eq!(normalize_status(500), 400);
    }

    #[test]
    fn mime_table_covers_spec_list() {
        assert_eq!(mime_type_for(Path::new("a.html")), "text/html");
        assert_eq!(mime_type_for(Path::new("a.css")), "text/css");
        assert_eq!(mime_type_for(Path::new("a.js")), "application/javascript");
        assert_eq!(mime_type_for(Path::new("a.unknownext")), "text/plain");
    }

    #[test]
    fn make_response_reports_keep_alive_headers() {
        let mut res = HttpResponse::new();
        res.set_status(200);
        res.set_keep_alive(true);
        res.set_inline_body(b"hi".to_vec(), "text/plain");
        let mut buf = Buffer::new();
        res.make_response(&mut buf);
        let head = String::from_utf8(buf.begin_read().to_vec()).unwrap();
        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("keep-alive: timeout=120, max=6"));
        assert!(head.contains("Content-length: 2"));
    }

    #[test]
    fn load_error_body_falls_back_to_inline_when_no_page_configured() {
        let mut res = HttpResponse::new();
        res.set_status(404);
        let s_cfg = ServerConfig {
            host: "127.0.0.1".into(),
            ports: vec![8080],
            server_name: "_".into(),
            default_server: false,
            error_pages: HashMap::new(),
            client_max_body_size: 1024,
            routes: Vec::new(),
        };
        res.load_error_body(&s_cfg);
        assert_eq!(res.body_bytes(), b"404 Not Found");
    }
}
