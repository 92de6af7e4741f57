//! # Snake Duel Server Library
//!
//! This library provides the authoritative server for two-player snake games.
//! Players open a room, share its code with an opponent, and once the second
//! player joins the server simulates the match on a fixed tick and streams
//! every frame to both of them.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns the board: snake bodies, the food cell and collision
//! rules. Clients only send key presses and render what they are told.
//!
//! ### Room Lifecycle
//! Handles the complete life of a room:
//! - Creation with a short random code
//! - Seating the second player and starting the ticker
//! - Announcing the winner (or a draw) exactly once
//! - Closing the room when a player leaves or goes silent
//!
//! ## Architecture Design
//!
//! ### Event Loop plus Room Tickers
//! One dispatch loop handles every inbound datagram in order. Each active
//! room additionally owns a ticker task; rooms never share a lock, so a busy
//! room cannot stall another.
//!
//! ### UDP-Based Communication
//! Uses UDP sockets carrying bincode-encoded [`shared::Packet`] values. State
//! frames are complete snapshots, so a lost frame is repaired by the next.
//!
//! ## Module Organization
//!
//! - `client_manager`: connected clients, their seats and timeouts
//! - `config`: validated runtime settings
//! - `game`: board rules and the per-tick step
//! - `game_loop`: the ticker task of one room
//! - `network`: socket tasks and packet dispatch
//! - `room_registry`: room codes and the sessions behind them
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!
//!     // Runs until the process is stopped:
//!     // - Accepts connections and room requests
//!     // - Starts a ticker for every room that fills up
//!     // - Drops clients that stop sending heartbeats
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod game_loop;
pub mod network;
pub mod room_registry;
