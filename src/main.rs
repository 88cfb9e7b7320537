//! Gomoku Server - CLI entry point
//!
//! Real-time two-player Gomoku rooms over HTTP with SSE push.

#![warn(missing_docs)]

use anyhow::Result;
use clap::Parser;
use gomoku_server::{AppState, Cli, Command, GameService, TokenTable};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port, host } => serve(host, port).await,
    }
}

/// Run the HTTP game server
async fn serve(host: String, port: u16) -> Result<()> {
    info!("Starting Gomoku room server");

    let identities = TokenTable::new();
    match std::env::var("GOMOKU_TOKENS") {
        Ok(spec) => {
            let loaded = identities.load(&spec);
            info!(loaded, "loaded identity tokens");
        }
        Err(_) => {
            warn!("GOMOKU_TOKENS not set; no caller can authenticate");
        }
    }

    let state = AppState {
        service: GameService::new(),
        identities: Arc::new(identities),
    };

    gomoku_server::run(&host, port, state).await
}
