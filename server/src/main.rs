use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

// Error tracing
use anyhow::{Context, Result};
use tracing::{error, info};

use server::app;
use server::auth::{EnvOrConfigSecret, SigningKey};
use server::database;
use worldsync_shared::config::load_config;

#[derive(Parser, Debug)]
#[command(name = "worldsync-server", version, about = "WorldSync auth and Google Calendar server")]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "WORLDSYNC_CONFIG", default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = load_config(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    // A missing or weak signing key is fatal: without it no token can be
    // issued or verified.
    let key = SigningKey::load(
        &EnvOrConfigSecret::from_auth_config(&config.auth),
        &config.auth.signing_key_env,
    )
    .context("Failed to load token signing key")?;

    let pool = database::connect(&config.database.url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    database::create_tables(&pool)
        .await
        .context("Failed to prepare database schema")?;

    let addr = config.server.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let state = app::build_state(config, &key, pool.clone())?;

    tokio::select! {
        result = app::serve(listener, state) => {
            if let Err(e) = &result {
                error!("Server stopped: {:#}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    pool.close().await;
    info!("Server closed");
    Ok(())
}
