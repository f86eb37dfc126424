//! Peer statistics module
//!
//! Tracks per-peer request/reply counters and picks the forwarding-hint
//! target for outbound requests.

pub mod stats;

pub use stats::{PeerRecord, StatsTable};
