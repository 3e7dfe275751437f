use server_proxy::config::AppConfig;
use server_proxy::error::format_fatal;
use server_proxy::server::Server;

fn main() {
    if let Err(err) = run() {
        eprintln!("{}", format_fatal(&err));
        std::process::exit(1);
    }
}

fn run() -> server_proxy::error::Result<()> {
    let config = AppConfig::load("config.yaml")?;
    config.display_config();

    let mut server = Server::new(config)?;
    let result = server.run();
    server.shutdown();
    result
}
