//! Config record shapes, grounded on the teacher's `config_handler/types.rs`
//! (`ServerConfig`/`RouteConfig`) but loaded through `serde_yaml` instead of
//! the hand-rolled `FromYaml` derive.

use std::collections::HashMap;

use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SERVER_NAME: &str = "_";
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576; // 1MB
pub const DEFAULT_ROUTE_PATH: &str = "/";
pub const DEFAULT_ROOT: &str = "./resources";
pub const DEFAULT_FILE: &str = "index.html";
pub const MAX_FD: usize = 65_536;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    #[serde(default = "default_route_path")]
    pub path: String,
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,
    pub redirection: Option<String>,
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default = "default_file")]
    pub default_file: String,
    #[serde(default)]
    pub autoindex: bool,
}

fn default_route_path() -> String {
    DEFAULT_ROUTE_PATH.to_string()
}
fn default_methods() -> Vec<String> {
    vec!["GET".to_string(), "POST".to_string()]
}
fn default_root() -> String {
    DEFAULT_ROOT.to_string()
}
fn default_file() -> String {
    DEFAULT_FILE.to_string()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            path: default_route_path(),
            methods: default_methods(),
            redirection: None,
            root: default_root(),
            default_file: default_file(),
            autoindex: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,
    #[serde(default = "default_server_name")]
    pub server_name: String,
    #[serde(default)]
    pub default_server: bool,
    #[serde(default)]
    pub error_pages: HashMap<u16, String>,
    #[serde(default = "default_max_body_size")]
    pub client_max_body_size: usize,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_ports() -> Vec<u16> {
    vec![DEFAULT_PORT]
}
fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}
fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ports: vec![DEFAULT_PORT],
            server_name: default_server_name(),
            default_server: false,
            error_pages: HashMap::new(),
            client_max_body_size: DEFAULT_MAX_BODY_SIZE,
            routes: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// The document root used by the register/login flow and by any
    /// request that doesn't match a more specific route: the first
    /// route mounted at `/`, falling back to the crate-wide default.
    pub fn default_root(&self) -> &str {
        self.routes
            .iter()
            .find(|r| r.path == "/")
            .map(|r| r.root.as_str())
            .unwrap_or(DEFAULT_ROOT)
    }
}

/// Engine-level settings plus the virtual-host list. Field names follow
/// spec.md §6's config record (`trigMode`, `timeoutMs`, ...) translated to
/// Rust's snake_case convention.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub trig_mode: u8,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub open_linger: bool,
    #[serde(default = "default_thread_num")]
    pub thread_num: usize,

    pub sql_host: String,
    #[serde(default = "default_sql_port")]
    pub sql_port: u16,
    pub sql_user: String,
    pub sql_pwd: String,
    pub sql_db_name: String,
    #[serde(default = "default_sql_conn_num")]
    pub sql_conn_num: usize,

    #[serde(default = "default_true")]
    pub open_log: bool,
    #[serde(default = "default_log_level")]
    pub log_level: u8,
    #[serde(default)]
    pub log_que_size: usize,

    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_timeout_ms() -> u64 {
    60_000
}
fn default_thread_num() -> usize {
    4
}
fn default_sql_port() -> u16 {
    5432
}
fn default_sql_conn_num() -> usize {
    4
}
fn default_log_level() -> u8 {
    1
}
