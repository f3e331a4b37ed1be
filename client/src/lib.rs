//! # Kart Client Library
//!
//! A headless participant in a kart session. It predicts the kart it controls,
//! reconciles that prediction against the authority's snapshots, and dead
//! reckons every other kart between their sparse updates.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Each tick the scripted input is sampled into a timestamped move, applied to
//! the local kart immediately, recorded in the prediction ledger, and sent.
//! Nothing waits for the server.
//!
//! ### Server Reconciliation
//! When a snapshot for the controlled kart arrives, the client snaps to it,
//! drops every move the snapshot acknowledges, and replays the rest. Because
//! both sides run the same deterministic step, a snapshot that agrees with the
//! prediction changes nothing.
//!
//! ### Dead Reckoning
//! Other karts are drawn along a cubic Hermite curve from where they are
//! currently rendered to where the latest snapshot puts them, with the curve's
//! tangents taken from the velocities at either end. The older last-move
//! replay smoothing is available with `--observer-mode replay`.
//!
//! ### Clock Synchronisation
//! Move timestamps are on the server's clock. Every packet the server sends
//! carries its world time, and the client keeps the least-delayed estimate of
//! the offset.
//!
//! ## Module Organization
//!
//! - `game`: every known kart in the role it plays on this client
//! - `input`: scripted throttle and steering
//! - `network`: UDP tasks, simulated latency, and the main `select!` loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", ClientConfig::default()).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
