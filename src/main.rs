//! Multi-room chat server - Entry point
//!
//! Starts the TCP listener, the ChatServer actor, and the admin console,
//! then accepts connections until shutdown.

use std::env;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use room_chat_server::{handle_connection, run_admin_console, ChatServer};

/// Default server address
const DEFAULT_ADDR: &str = "127.0.0.1:12345";

/// Channel buffer size for server commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=room_chat_server=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("room_chat_server=info")),
        )
        .init();

    // Get bind address from command line or use default
    let addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Start TCP listener; a failed bind aborts startup entirely
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat server listening on {}", addr);

    // Create the ChatServer actor and the shutdown signal it controls
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = ChatServer::new(cmd_rx, shutdown_tx);
    tokio::spawn(server.run());

    info!("ChatServer actor started");

    // Operator console on stdin
    tokio::spawn(run_admin_console(cmd_tx.clone(), shutdown_rx.clone()));

    // Connection accept loop; stops when the actor flips the shutdown flag
    let mut shutdown_rx = shutdown_rx;
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        info!("New connection from {}", addr);
                        let cmd_tx = cmd_tx.clone();

                        // Spawn handler task for each connection
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, cmd_tx).await {
                                error!("Connection handler error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
