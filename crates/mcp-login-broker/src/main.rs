//! MCP Login Broker - Entry Point

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_login_broker::{
    AuthorizationFlow,
    config::Config,
    exchange::HttpIdentityExchange,
    issuer::CodeIssuer,
    registry::InMemoryClientRegistry,
    server::BrokerServer,
    store::MemoryKvStore,
};

#[derive(Parser, Debug)]
#[command(name = "mcp-login-broker")]
#[command(about = "OAuth broker between MCP hosts and a social-login identity provider")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(long, default_value = "8787", env = "PORT")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting MCP login broker");

    let config = Config::from_env()?;
    tracing::debug!(?config, "Loaded configuration");

    let registry = InMemoryClientRegistry::with_clients(config.clients.clone());
    tracing::info!(clients = registry.len().await, "Loaded OAuth clients");

    let issuer = Arc::new(CodeIssuer::new());
    Arc::clone(&issuer).start_cleanup_task();

    let exchange = HttpIdentityExchange::new(&config)?;
    let flow = AuthorizationFlow::new(
        config,
        Arc::new(MemoryKvStore::new()),
        Arc::new(registry),
        Arc::new(exchange),
        issuer,
    )?;

    BrokerServer::new(flow).run_http(cli.port).await
}
