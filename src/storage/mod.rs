//! Storage module
//!
//! The codec frames payload files into data packets and back, and
//! persists descriptors; the state store keeps the in-memory torrent
//! state and reconciles it with the disk on startup.

pub mod codec;
pub mod store;

pub use store::StateStore;
