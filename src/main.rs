use mcp_devtools_server::config::ServerConfig;
use mcp_devtools_server::server::McpServer;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // stdout carries the protocol; all diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match ServerConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let mut server = McpServer::new(config);
    if let Err(e) = server.run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}
