use server_proxy::config::{RouteConfig, ServerConfig};
use server_proxy::http::Method;
use server_proxy::router::RoutingError;

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

fn server(routes: Vec<RouteConfig>) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        ports: vec![8080],
        server_name: "localhost".to_string(),
        default_server: true,
        error_pages: Default::default(),
        client_max_body_size: 1024,
        routes,
    }
}

#[test]
fn test_router_simple_match() {
    let s_cfg = server(vec![route("/", &["GET"])]);
    let matched = s_cfg.find_route("/", Method::Get).unwrap();
    assert_eq!(matched.path, "/");
}

#[test]
fn test_router_falls_back_to_root_for_unconfigured_path() {
    let s_cfg = server(vec![route("/", &["GET"])]);
    let matched = s_cfg.find_route("/unconfigured", Method::Get).unwrap();
    assert_eq!(matched.path, "/");
}

#[test]
fn test_router_longest_prefix_match() {
    let s_cfg = server(vec![route("/a", &["GET"]), route("/a/b", &["GET"])]);
    let matched = s_cfg.find_route("/a/b/c", Method::Get).unwrap();
    assert_eq!(matched.path, "/a/b");
}

#[test]
fn test_router_method_not_allowed() {
    let s_cfg = server(vec![route("/", &["GET"])]);
    let result = s_cfg.find_route("/", Method::Post);
    assert!(matches!(result, Err(RoutingError::MethodNotAllowed)));
}

#[test]
fn test_router_path_not_found() {
    let s_cfg = server(vec![route("/a", &["GET"])]);
    let result = s_cfg.find_route("/b", Method::Get);
    assert!(matches!(result, Err(RoutingError::NotFound)));
}
