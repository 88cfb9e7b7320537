//! Command-line interface for gomoku_server.

use clap::{Parser, Subcommand};

/// Gomoku Server - real-time two-player room server
#[derive(Parser, Debug)]
#[command(name = "gomoku_server")]
#[command(about = "Two-player Gomoku rooms over HTTP with SSE push", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP game server
    Serve {
        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}
