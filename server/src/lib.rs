//! # Kart Authority Server
//!
//! The single authoritative participant of a kart session. It owns the
//! canonical state of every kart, validates and simulates the moves clients
//! send, and replicates the resulting snapshots to everyone at a bounded rate.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Every accepted move is run through the same deterministic movement step the
//! clients use for prediction. Clients reconcile against what the server
//! publishes, so the server's result is always the one that sticks.
//!
//! ### Move Validation
//! A move is refused when its inputs are outside full deflection, or when the
//! total time the client has simulated would reach the server's world time.
//! A refused move changes nothing and is only logged.
//!
//! ### Snapshot Broadcasting
//! Each kart's latest snapshot sits in a last-value-wins slot. At the snapshot
//! rate (1Hz by default) the server sends only the karts whose snapshot
//! changed. A client that just connected gets every kart once.
//!
//! ### Bots
//! The server can drive karts itself. These sample moves every tick through
//! the same sampler and simulator a client would use, without a network hop.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection tracking, timeouts, per-client move counts
//! - `game`: the authoritative karts, their snapshot slots, and bot drivers
//! - `network`: UDP socket tasks, packet handling, and the main `select!` loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod network;
