//! Route resolution (component K's dispatch helper), grounded on the
//! teacher's `src/router.rs` stub but filled in: longest-prefix match
//! over a `ServerConfig`'s routes, the way NGINX-style `location`
//! blocks resolve.

use thiserror::Error;

use crate::config::{RouteConfig, ServerConfig};
use crate::http::Method;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no route matches this path")]
    NotFound,
    #[error("route matched but method is not allowed")]
    MethodNotAllowed,
}

impl ServerConfig {
    /// Picks the route whose `path` is the longest prefix of `url`,
    /// then checks `method` against that route's allow-list.
    pub fn find_route(&self, url: &str, method: Method) -> Result<&RouteConfig, RoutingError> {
        let route = self
            .routes
            .iter()
            .filter(|r| url.starts_with(r.path.as_str()))
            .max_by_key(|r| r.path.len())
            .ok_or(RoutingError::NotFound)?;

        if route
            .methods
            .iter()
            .any(|m| m.eq_ignore_ascii_case(method.as_str()))
        {
            Ok(route)
        } else {
            Err(RoutingError::MethodNotAllowed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(routes: Vec<RouteConfig>) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".into(),
            ports: vec![8080],
            server_name: "_".into(),
            default_server: true,
            error_pages: Default::default(),
            client_max_body_size: 1024,
            routes,
        }
    }

    fn route(path: &str, methods: &[&str]) -> RouteConfig {
        RouteConfig {
            path: path.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            redirection: None,
            root: "./resources".to_string(),
            default_file: "index.html".to_string(),
            autoindex: false,
        }
    }

    #[test]
    fn longest_prefix_wins() {
        let s_cfg = cfg(vec![route("/", &["GET", "POST"]), route("/api", &["GET"])]);
        let matched = s_cfg.find_route("/api/v1", Method::Get).unwrap();
        assert_eq!(matched.path, "/api");
    }

    #[test]
    fn disallowed_method_is_reported() {
        let s_cfg = cfg(vec![route("/", &["GET"])]);
        assert!(matches!(
            s_cfg.find_route("/index.html", Method::Post),
            Err(RoutingError::MethodNotAllowed)
        ));
    }

    #[test]
    fn no_matching_prefix_is_not_found() {
        let s_cfg = cfg(vec![route("/api", &["GET"])]);
        assert!(matches!(
            s_cfg.find_route("/other", Method::Get),
            Err(RoutingError::NotFound)
        ));
    }
}
