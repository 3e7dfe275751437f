//! Static file resolution (component I step 1), grounded on the
//! teacher's `src/handlers/get_handler.rs` but matching spec.md
//! §4.I's stat-based 400/403/404 classification instead of mapping
//! `io::Error` kinds directly.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use crate::config::ServerConfig;
use crate::http::HttpResponse;

/// Resolves `path` under the route's document root and loads it into
/// `response`. `path` is the already-canonicalized request path (see
/// `http::request::canonicalize_path`), so `/` never reaches here.
pub fn handle_get(path: &str, root: &str, s_cfg: &ServerConfig, response: &mut HttpResponse) {
    let mut full_path = PathBuf::from(root);
    full_path.push(path.trim_start_matches('/'));

    let metadata = match fs::metadata(&full_path) {
        Ok(m) => m,
        Err(_) => {
            response.set_status(404);
            response.load_error_body(s_cfg);
            return;
        }
    };

    if metadata.is_dir() {
        response.set_status(400);
        response.load_error_body(s_cfg);
        return;
    }

    // S_IROTH: other-readable bit.
    if metadata.permissions().mode() & 0o004 == 0 {
        response.set_status(403);
        response.load_error_body(s_cfg);
        return;
    }

    if response.map_file(&full_path).is_err() {
        response.set_status(404);
        response.load_error_body(s_cfg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn s_cfg(_root: &str) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            ports: vec![8080],
            server_name: "_".into(),
            default_server: true,
            error_pages: HashMap::new(),
            client_max_body_size: 1024,
            routes: Vec::new(),
        }
    }

    #[test]
    fn serves_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(tmp.path().join("index.html")).unwrap();
        f.write_all(b"<html>hi</html>").unwrap();

        let mut response = HttpResponse::new();
        handle_get(
            "/index.html",
            tmp.path().to_str().unwrap(),
            &s_cfg(tmp.path().to_str().unwrap()),
            &mut response,
        );
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.body_bytes(), b"<html>hi</html>");
    }

    #[test]
    fn missing_file_is_404() {
        let tmp = tempfile::tempdir().unwrap();
        let mut response = HttpResponse::new();
        handle_get(
            "/nope.html",
            tmp.path().to_str().unwrap(),
            &s_cfg(tmp.path().to_str().unwrap()),
            &mut response,
        );
        assert_eq!(response.status_code(), 404);
    }

    #[test]
    fn directory_is_400() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        let mut response = HttpResponse::new();
        handle_get(
            "/sub",
            tmp.path().to_str().unwrap(),
            &s_cfg(tmp.path().to_str().unwrap()),
            &mut response,
        );
        assert_eq!(response.status_code(), 400);
    }
}
