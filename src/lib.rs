//! Multi-room TCP Chat Server Library
//!
//! A line-protocol chat server: clients connect over TCP, claim a unique
//! username, join named rooms, and exchange broadcast messages, with
//! private messaging and an administrative operator console.
//!
//! # Features
//! - Username authentication (3-12 alphanumeric, case-insensitive uniqueness)
//! - Named rooms with implicit creation and seeded defaults
//! - Room-scoped, system-wide, and private message delivery
//! - Admin console: kick users, delete rooms, graceful shutdown
//! - Disconnection handling with departure announcements
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning the session table and the
//!   user/room registries
//! - Each connection has a handler task communicating with the actor
//! - No locks needed - all state access goes through message passing, which
//!   also serializes room broadcasts against membership changes
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::{mpsc, watch};
//! use room_chat_server::{ChatServer, handle_connection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:12345").await.unwrap();
//!     let (cmd_tx, cmd_rx) = mpsc::channel(256);
//!     let (shutdown_tx, _shutdown_rx) = watch::channel(false);
//!
//!     tokio::spawn(ChatServer::new(cmd_rx, shutdown_tx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let cmd_tx = cmd_tx.clone();
//!         tokio::spawn(handle_connection(stream, cmd_tx));
//!     }
//! }
//! ```

pub mod admin;
pub mod broadcast;
pub mod error;
pub mod handler;
pub mod message;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use admin::run_admin_console;
pub use error::{AppError, CommandError, SendError};
pub use handler::handle_connection;
pub use message::{ClientCommand, ServerMessage};
pub use registry::{RoomRegistry, UserRegistry, LOBBY};
pub use server::{ChatServer, ServerCommand, SessionInfo};
pub use session::Session;
pub use types::{SessionId, Username};
