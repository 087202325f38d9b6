//! Real-time sync engine: the hub serializes client operations against the
//! shared board and fans the resulting events out to every connection; the
//! agent mirrors the board on the client side and survives disconnects by
//! reconnecting and resyncing in full.

pub mod agent;
pub mod hub;
pub mod protocol;

pub use agent::{AgentConfig, LinkState, SyncAgent};
pub use hub::Hub;
pub use protocol::{ClientOp, ServerEvent};
