//! # Lanboard - Ephemeral LAN Pasteboard
//!
//! Real-time shared board for a local network: anything pasted on one device
//! shows up on every other device immediately.
//!
//! ## Features
//!
//! - **One board per network**: a single in-memory feed, fanned out to every
//!   connected client over WebSocket
//! - **Ephemeral**: nothing is ever written to disk; the board vanishes
//!   when the server exits
//! - **Optimistic updates**: local changes apply instantly and reconcile with
//!   the server echo by item id
//! - **Self-healing links**: clients reconnect on a fixed delay and resync
//!   from a fresh snapshot instead of replaying missed events
//! - **Content-addressed uploads**: identical payloads share bytes, and
//!   uploads are discarded once no item references them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lanboard::{AgentConfig, SyncAgent};
//!
//! #[tokio::main]
//! async fn main() {
//!     let agent = Arc::new(SyncAgent::new(AgentConfig::new("ws://192.168.1.20:3210/ws")));
//!
//!     let link = agent.clone();
//!     tokio::spawn(async move { link.run().await });
//!
//!     let (item, _sent) = agent.submit_text("hello from the docs");
//!     println!("posted {}", item.id);
//! }
//! ```

pub mod ai;
pub mod blobs;
pub mod feed;
pub mod net;
pub mod server;
pub mod sync;

// Re-export main types for library consumers
pub use feed::{Item, ItemKind, ItemStore};
pub use sync::{AgentConfig, ClientOp, Hub, LinkState, ServerEvent, SyncAgent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
