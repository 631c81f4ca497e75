use anyhow::Context;
use clap::Parser;
use scout::api::create_router;
use scout::config::{Config, SupabaseConfig};
use scout::db::Database;
use tracing_subscriber::EnvFilter;

/// HTTP service for stored property searches and their listings.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Keep records in process memory instead of Supabase
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let db = if args.in_memory {
        Database::in_memory()
    } else {
        let supabase = SupabaseConfig::from_env()?;
        Database::supabase(&supabase).context("Failed to build Supabase client")?
    };

    let host = args.host.unwrap_or(config.host);
    let port = args.port.unwrap_or(config.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(db))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
