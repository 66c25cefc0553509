//! # Parity Grid Server Library
//!
//! This library provides the authoritative server for the two-player parity
//! grid game. Players increment cells of a 5x5 board; the first row, column
//! or diagonal whose five values are all odd (or all even, zero excluded)
//! decides the winner. The server holds the only board that counts and tells
//! every connected client what happened.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Session
//! One [`session::Session`] lives for the whole process. It binds the first
//! connection to the ODD slot and the second to EVEN, applies increments,
//! detects wins, restarts games and ends a game when a player leaves.
//!
//! ### Client Management
//! [`client_manager::ClientManager`] tracks every open connection, including
//! ones that will be turned away, and delivers messages to one or all of them.
//!
//! ### Event Serialisation
//! [`network::Server`] accepts WebSocket connections and funnels every open,
//! message and close into a single channel. The main loop handles each event
//! to completion before the next, so input that arrives late or out of order
//! is applied in arrival order with no locking.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! - Slot assignment and rejection of a third player
//! - Move validation, win detection and game-over handling
//! - Restart and disconnect recovery
//!
//! ### Client Manager Module (`client_manager`)
//! - Connection registry keyed by client ID
//! - Unicast and broadcast delivery that skips closed connections
//! - Server-initiated close
//!
//! ### Network Module (`network`)
//! - TCP listener and WebSocket handshake
//! - Per-connection reader and writer tasks
//! - The serial event loop that drives the session
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("127.0.0.1:8081").await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
pub mod session;
