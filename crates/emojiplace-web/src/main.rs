//! EmojiPlace server: a shared, unbounded emoji canvas with AI agents.

use anyhow::{Context, Result};
use clap::Parser;
use emojiplace_llm::ReasoningGateway;
use emojiplace_web::{create_router, AppState, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "emojiplace")]
#[command(about = "EmojiPlace - a shared emoji canvas with resident AI agents")]
#[command(version)]
struct Cli {
    /// Path to config file (default: emojiplace.toml in this or a parent directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to SQLite database for durable pixels
    #[arg(short, long)]
    db: Option<PathBuf>,

    /// Don't run the agent orchestrator
    #[arg(long)]
    no_agents: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", Config::default_toml()?);
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(db) = cli.db {
        config.storage.sqlite_path = Some(db);
    }
    if cli.no_agents {
        config.agents.enabled = false;
    }

    let state = AppState::new(&config)?;

    if let Some(orchestrator) = state.orchestrator.clone() {
        let gateways = orchestrator.clone();
        tokio::spawn(async move {
            match gateways.gateway().health_check().await {
                Ok(true) => info!("Reasoning gateways reachable"),
                Ok(false) => warn!("Some reasoning gateways are unreachable; those agents will idle"),
                Err(e) => warn!("Reasoning gateway health check failed: {}", e),
            }
        });

        let every = config.agents.interval();
        info!("Agent orchestrator running every {:?}", every);
        tokio::spawn(orchestrator.run_every(every));
    }

    let app = create_router(state);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("EmojiPlace listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
