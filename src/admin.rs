//! Administrative operator console
//!
//! Reads operator commands from stdin and dispatches them to the server
//! actor: `/stop`, `/list`, `/kick <user>`, `/rooms`, `/delroom <room>`,
//! `/help`. Results print straight to the operator's terminal.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

use crate::server::ServerCommand;

/// Parsed operator input
#[derive(Debug, Clone, PartialEq, Eq)]
enum AdminCommand {
    Stop,
    ListUsers,
    ListRooms,
    Kick(String),
    DeleteRoom(String),
    Help,
}

impl AdminCommand {
    /// Parse one console line; Err carries the message to show the operator
    fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.trim().split_whitespace();
        let token = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next();

        match token.as_str() {
            "/stop" => Ok(Self::Stop),
            "/list" => Ok(Self::ListUsers),
            "/rooms" => Ok(Self::ListRooms),
            "/help" => Ok(Self::Help),
            "/kick" => arg
                .map(|a| Self::Kick(a.to_string()))
                .ok_or_else(|| "Usage: /kick <username>".to_string()),
            "/delroom" => arg
                .map(|a| Self::DeleteRoom(a.to_string()))
                .ok_or_else(|| "Usage: /delroom <roomname>".to_string()),
            "/ban" => Err("Ban is not supported".to_string()),
            "" => Err(String::new()),
            other => Err(format!("Unknown command '{}'. Type /help for commands", other)),
        }
    }
}

/// Run the operator console until `/stop` or server shutdown
pub async fn run_admin_console(
    cmd_tx: mpsc::Sender<ServerCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    println!("Admin console active. Commands: /stop, /list, /kick <user>, /rooms, /delroom <room>, /help");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    warn!("Admin console read error: {}", e);
                    break;
                }
            },
            _ = shutdown.changed() => break,
        };

        let cmd = match AdminCommand::parse(&line) {
            Ok(cmd) => cmd,
            Err(msg) => {
                if !msg.is_empty() {
                    println!("{}", msg);
                }
                continue;
            }
        };

        if dispatch(&cmd_tx, cmd).await.is_err() {
            break;
        }
    }
}

/// Send one admin command to the actor and print the outcome
///
/// Err means the actor is gone and the console should exit.
async fn dispatch(cmd_tx: &mpsc::Sender<ServerCommand>, cmd: AdminCommand) -> Result<(), ()> {
    match cmd {
        AdminCommand::Stop => {
            cmd_tx
                .send(ServerCommand::Shutdown)
                .await
                .map_err(|_| ())?;
            Err(())
        }
        AdminCommand::ListUsers => {
            let (tx, rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::ListSessions { reply: tx })
                .await
                .map_err(|_| ())?;
            let infos = rx.await.map_err(|_| ())?;
            println!("Online users ({}):", infos.len());
            for info in infos {
                println!("- {:<15} (room: {:<10} addr: {})", info.name, info.room, info.addr);
            }
            Ok(())
        }
        AdminCommand::ListRooms => {
            let (tx, rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::RoomOverview { reply: tx })
                .await
                .map_err(|_| ())?;
            let rooms = rx.await.map_err(|_| ())?;
            println!("Active rooms ({}):", rooms.len());
            for (name, count) in rooms {
                println!("- {:<15} ({} users)", name, count);
            }
            Ok(())
        }
        AdminCommand::Kick(name) => {
            let (tx, rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::Kick {
                    name: name.clone(),
                    reply: tx,
                })
                .await
                .map_err(|_| ())?;
            if rx.await.map_err(|_| ())? {
                println!("Kicked user: {}", name);
            } else {
                println!("User not found: {}", name);
            }
            Ok(())
        }
        AdminCommand::DeleteRoom(name) => {
            let (tx, rx) = oneshot::channel();
            cmd_tx
                .send(ServerCommand::DeleteRoom {
                    name: name.clone(),
                    reply: tx,
                })
                .await
                .map_err(|_| ())?;
            match rx.await.map_err(|_| ())? {
                Ok(moved) => println!("Deleted room: {} ({} users moved to lobby)", name, moved),
                Err(e) => println!("{}", e),
            }
            Ok(())
        }
        AdminCommand::Help => {
            println!("ADMIN COMMANDS:");
            println!("/stop - Shutdown server");
            println!("/list - List all users");
            println!("/kick <user> - Disconnect user");
            println!("/rooms - List all rooms");
            println!("/delroom <room> - Delete a room (users moved to lobby)");
            println!("/help - Show this help");
            Ok(())
        }
    }
}
