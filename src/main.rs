use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use axum::http::{HeaderValue, Method, header};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use voicelive_bridge::{AppState, Config, routes};

/// Voice Live session bridge - realtime voice agent server
#[derive(Parser, Debug)]
#[command(name = "voicelive-bridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the config layer reads the environment
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // TLS crypto provider for the upstream wss connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let address = config.bind_addr();
    let cors_layer = build_cors_layer(&config.server.cors_allowed_origins);

    let state = AppState::new(config)?;
    info!(
        tools = ?state.tools.names(),
        mcp_servers = state.mcp_servers.len(),
        "State initialized"
    );

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_router(state)
        .layer(cors_layer)
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;
    info!("Listening on http://{}", socket_addr);

    let listener = TcpListener::bind(&socket_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// CORS policy from configuration: empty list means same-origin only,
/// a lone "*" opens it up, anything else is an explicit origin list.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else if origins.is_empty() {
        info!("CORS not configured, defaulting to same-origin only");
        layer
    } else {
        let origins: Vec<_> = origins
            .iter()
            .filter_map(|o| o.trim().parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
