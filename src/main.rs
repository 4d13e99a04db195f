use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use warden::config::{self, Config};
use warden::error::WardenError;
use warden::service::Service;
use warden::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version)]
#[command(about = "In-memory command relay and liveness tracker for remote game servers")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "WARDEN_PORT", default_value = "3000")]
    port: u16,

    /// Address to bind
    #[arg(long, env = "WARDEN_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Operator API key expected in the X-API-Key header
    #[arg(long, env = "WARDEN_API_KEY")]
    api_key: Option<String>,

    /// Reject operator requests that lack the API key
    #[arg(long, env = "WARDEN_REQUIRE_API_KEY")]
    require_api_key: bool,

    /// Secret for signing server bearer tokens
    #[arg(long, env = "WARDEN_JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Comma-separated CORS origin allow-list; empty allows any origin
    #[arg(long, env = "WARDEN_ALLOWED_ORIGINS", default_value = "")]
    allowed_origins: String,

    /// Minutes a queued command lives before eviction
    #[arg(long, env = "WARDEN_COMMAND_TTL_MINUTES", default_value = "60")]
    command_ttl_minutes: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listen_addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| WardenError::Config(format!("invalid listen address: {e}")))?;

    let mut config = Config::new(listen_addr)
        .with_command_ttl(chrono::Duration::minutes(args.command_ttl_minutes))
        .with_allowed_origins(config::parse_origins(&args.allowed_origins));
    if let Some(key) = args.api_key {
        config = config.with_api_key(key, args.require_api_key);
    } else {
        config.require_api_key = args.require_api_key;
    }
    if let Some(secret) = args.jwt_secret {
        config = config.with_jwt_secret(secret);
    }

    if config.has_placeholder_secrets() {
        tracing::warn!(
            "running with placeholder credentials, set WARDEN_API_KEY and WARDEN_JWT_SECRET"
        );
    }

    let shutdown = install_shutdown_handler();
    Service::new(config).run(shutdown).await?;

    Ok(())
}
