//! MCP OAuth Authorization Server - Entry Point

use std::net::{IpAddr, SocketAddr};

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_authserver::{config::Config, server::AuthServer};

#[derive(Parser, Debug)]
#[command(name = "mcp-authserver")]
#[command(about = "OAuth 2.0 authorization server (PKCE + JWKS) for MCP endpoints")]
#[command(version)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: IpAddr,

    /// HTTP server port
    #[arg(long, default_value = "9000", env = "PORT")]
    port: u16,

    /// Issuer base URL advertised in metadata and the `iss` claim
    /// (defaults to http://localhost:<port>)
    #[arg(long, env = "OAUTH_ISSUER")]
    issuer: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting MCP OAuth authorization server");

    let config = Config::new(SocketAddr::new(cli.host, cli.port), cli.issuer);

    // Without a signing key there is nothing to serve.
    let server = AuthServer::new(config).inspect_err(|e| {
        tracing::error!(error = %e, "Startup failed");
    })?;

    server.run().await
}
