//! # Parity Grid Client Library
//!
//! Interactive client for the parity grid server. It shows the shared 5x5
//! board, sends increments and restarts, and keeps its local view in step
//! with the authoritative server.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! - Local mirror of the board, slot and outcome
//! - Optimistic increments tracked as pending until the server echoes them
//! - Non-authoritative win preview from the shared `check_win`
//!
//! ### Network Module (`network`)
//! - WebSocket connection on a background tokio runtime
//! - Chaos mode: random per-message send delay to provoke reordering
//!
//! ### Input Module (`input`)
//! - Mouse clicks mapped to squares, keys mapped to restart and chaos controls
//!
//! ### Rendering Module (`rendering`)
//! - Board layout, parity colouring, winning-line and pending highlights

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
