//! # swapi-favorites
//!
//! Star Wars people and planets over HTTP/JSON, with accounts and per-user
//! favorites.
//!
//! ## Architecture
//!
//! - **Store**: SQLite through `sqlx`; tables are created at startup when missing
//! - **Seed**: Optional TOML file of people and planets for empty tables
//! - **Auth**: Argon2id password hashes and HS256 bearer tokens
//! - **HTTP**: Axum router with rate limiting, request IDs, and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod http;
mod models;
mod seed;
mod store;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::TokenIssuer;
use crate::config::{AppConfig, Cli};
use crate::http::{router, AppState};
use crate::seed::{apply_seed, load_seed_file};
use crate::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    if config.default_jwt_secret {
        warn!("JWT_SECRET_KEY is not set; signing tokens with the built-in development secret");
    }

    let tokens = TokenIssuer::new(&config.jwt_secret, config.token_ttl);
    info!(
        bind = %config.bind,
        database_url = %config.database_url,
        token_ttl = %humantime::format_duration(tokens.ttl()),
        seed_file = ?config.seed_file.as_ref().map(|path| path.display().to_string()),
        "configuration loaded"
    );

    let store = Store::connect(&config.database_url)
        .await
        .with_context(|| format!("failed to open database {}", config.database_url))?;
    store
        .migrate()
        .await
        .context("failed to prepare database schema")?;

    if let Some(path) = config.seed_file.as_deref() {
        let data = load_seed_file(path).context("failed to load seed file")?;
        let report = apply_seed(&store, &data)
            .await
            .context("failed to seed database")?;
        info!(
            people = report.people,
            planets = report.planets,
            path = %path.display(),
            "seed applied"
        );
    }

    let state = AppState::new(store, tokens);

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "swapi-favorites listening");

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
            info!("shutting down gracefully");
        })
        .await
        .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
