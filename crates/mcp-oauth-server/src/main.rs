//! MCP OAuth Server - Entry Point
//!
//! Provides both stdio and HTTP transports.

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_oauth_server::config::Config;
use mcp_oauth_server::provider::{ProviderKind, create_provider};
use mcp_oauth_server::server::McpServer;
use mcp_oauth_server::server::oauth::{AuthorizationServer, StoreKind, open_store};

#[derive(Parser, Debug)]
#[command(name = "mcp-oauth-server")]
#[command(about = "MCP server with an embedded OAuth 2.0 authorization server")]
#[command(version)]
struct Cli {
    /// Transport mode: stdio or http
    #[arg(long, default_value = "http", env = "MCP_TRANSPORT")]
    transport: Transport,

    /// HTTP server port (only used with --transport http)
    #[arg(long, default_value = "8000", env = "PORT")]
    port: u16,

    /// Public base URL of this server, used as OAuth issuer (e.g., https://mcp.example.com)
    #[arg(long, default_value = "http://localhost:8000", env = "BASE_URL")]
    base_url: String,

    /// Credential store backend
    #[arg(long, default_value = "memory", env = "CREDENTIAL_STORE")]
    store: StoreKind,

    /// Redis URL (only used with --store redis)
    #[arg(long, default_value = "redis://127.0.0.1:6379", env = "REDIS_URL")]
    redis_url: String,

    /// Upstream identity provider
    #[arg(long, default_value = "github", env = "OAUTH_PROVIDER")]
    provider: ProviderKind,

    /// Client id of this server's OAuth app at the provider
    #[arg(long, env = "OAUTH_CLIENT_ID")]
    client_id: String,

    /// Client secret of this server's OAuth app at the provider
    #[arg(long, env = "OAUTH_CLIENT_SECRET", hide_env_values = true)]
    client_secret: String,

    /// Provider web base URL, for self-hosted GitLab/Gitea or GitHub Enterprise
    #[arg(long, env = "OAUTH_PROVIDER_URL")]
    provider_url: Option<String>,

    /// Provider API base URL, when it cannot be derived from --provider-url
    #[arg(long, env = "OAUTH_PROVIDER_API_URL")]
    provider_api_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum Transport {
    /// Standard input/output
    Stdio,
    /// Streamable HTTP with the OAuth endpoints
    #[default]
    Http,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so the stdio transport keeps stdout for JSON-RPC
    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cli.transport,
        provider = ?cli.provider,
        store = ?cli.store,
        "Starting MCP OAuth server"
    );

    let mut config = Config::new(cli.base_url, cli.provider, cli.client_id, cli.client_secret)
        .with_store(cli.store)
        .with_redis_url(cli.redis_url);
    config.provider_base_url = cli.provider_url;
    config.provider_api_url = cli.provider_api_url;

    let store = open_store(&config).await?;
    let provider = create_provider(&config)?;
    let server = McpServer::new(AuthorizationServer::new(store, provider, &config));

    match cli.transport {
        Transport::Stdio => {
            tracing::info!("Running in stdio mode");
            server.run_stdio().await?;
        }
        Transport::Http => {
            tracing::info!(port = cli.port, base_url = %config.base_url, "Running in HTTP mode");
            server.run_http(cli.port).await?;
        }
    }

    Ok(())
}
