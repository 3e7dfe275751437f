use server_proxy::config::{AppConfig, ServerConfig};

fn sql_block() -> &'static str {
    "sql_host: 127.0.0.1\nsql_user: admin\nsql_pwd: secret\nsql_db_name: server_proxy\n"
}

#[test]
fn test_valid_server_config() {
    let yaml_str = "
        host: 0.0.0.0
        ports: [80, 443]
        server_name: myserv
        client_max_body_size: 2048
        routes:
          - path: /
            root: ./www
    ";
    let config: ServerConfig = serde_yaml::from_str(yaml_str).unwrap();

    assert_eq!(config.host, "0.0.0.0");
    assert_eq!(config.ports, vec![80, 443]);
    assert_eq!(config.server_name, "myserv");
    assert_eq!(config.client_max_body_size, 2048);
    assert_eq!(config.routes[0].path, "/");
}

#[test]
fn test_valid_app_config() {
    let yaml_str = format!(
        r#"
{}
servers:
  - host: "127.0.0.1"
    ports: [8080, 8081]
    server_name: "test_server"
    default_server: true
    client_max_body_size: 1024
    routes:
      - path: "/"
        methods: ["GET"]
        root: "./www"
        default_file: "index.html"
        autoindex: true
"#,
        sql_block()
    );
    let config = AppConfig::from_str(&yaml_str).expect("should parse valid config");
    assert_eq!(config.servers.len(), 1);
    let server = &config.servers[0];
    assert_eq!(server.host, "127.0.0.1");
    assert_eq!(server.ports, vec![8080, 8081]);
    assert_eq!(server.server_name, "test_server");
    assert!(server.default_server);
    assert_eq!(server.client_max_body_size, 1024);
    assert_eq!(server.routes.len(), 1);
    assert_eq!(server.routes[0].path, "/");
}

#[test]
fn test_missing_required_sql_field_is_error() {
    let yaml_str = "sql_host: 127.0.0.1\nsql_user: admin\nsql_pwd: secret\n";
    assert!(AppConfig::from_str(yaml_str).is_err());
}

#[test]
fn test_malformed_yaml_is_error() {
    let yaml = "servers:\n  - host \"127.0.0.1\"\n";
    let err = AppConfig::from_str(yaml).unwrap_err();
    let msg = format!("{}", err);
    assert!(msg.contains("invalid config"));
}

#[test]
fn test_unknown_field_is_ignored() {
    let yaml_str = "
        host: 127.0.0.1
        fake_setting: 123
    ";
    let config: ServerConfig = serde_yaml::from_str(yaml_str).unwrap();
    assert_eq!(config.host, "127.0.0.1");
}

#[test]
fn test_full_app_config_multiple_servers() {
    let yaml_str = format!(
        "
        {}
        servers:
          - server_name: web1
            host: 127.0.0.1
            ports: [8080, 8081]
            routes:
              - path: /
                root: ./web1/www
          - server_name: web2
            host: 127.0.0.1
            ports: [9090]
            routes:
              - path: /
                root: ./web2/www
        ",
        sql_block()
    );
    let config = AppConfig::from_str(&yaml_str).unwrap();
    assert_eq!(config.servers.len(), 2);
    assert_eq!(config.servers[0].server_name, "web1");
    assert_eq!(config.servers[1].ports, vec![9090]);
}

#[test]
fn test_default_values() {
    let yaml_str = "server_name: test_default";
    let config: ServerConfig = serde_yaml::from_str(yaml_str).unwrap();

    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.ports, vec![8080]);
    assert_eq!(config.routes.len(), 0);
}

#[test]
fn test_error_pages_default() {
    let yaml_str = "host: 127.0.0.1";
    let config: ServerConfig = serde_yaml::from_str(yaml_str).unwrap();
    assert!(config.error_pages.is_empty());
}

#[test]
fn test_invalid_port_type_is_error() {
    let yaml_str = "ports: [80, 'abc']";
    let result: Result<ServerConfig, _> = serde_yaml::from_str(yaml_str);
    assert!(result.is_err());
}

#[test]
fn test_invalid_client_max_body_size_type_is_error() {
    let yaml_str = "client_max_body_size: abc";
    let result: Result<ServerConfig, _> = serde_yaml::from_str(yaml_str);
    assert!(result.is_err());
}

#[test]
fn test_invalid_autoindex_type_in_route_is_error() {
    let yaml_str = "
        routes:
          - path: /
            autoindex: not_a_bool
    ";
    let result: Result<ServerConfig, _> = serde_yaml::from_str(yaml_str);
    assert!(result.is_err());
}
