//! ndtorrent
//!
//! The core of a content-addressed, peer-to-peer file distribution
//! system over name-based networking, with seeding and resume support.
//! A torrent is a tree of signed descriptors: torrent-file segments at
//! the root, per-file sub-manifest chains below them, and fixed-size
//! data packets at the leaves. The [`TorrentManager`] downloads what the
//! node lacks, serves what it holds, and reconciles partial on-disk
//! state at startup.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod name;
pub mod peer;
pub mod storage;
pub mod transport;

pub use error::CoreError;

pub use config::{
    Config, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_LIFETIME, DEFAULT_SORTING_INTERVAL,
    DEFAULT_WINDOW_SIZE,
};
pub use descriptor::{
    classify, DataPacket, Descriptor, FileManifest, NameKind, TorrentSegment,
};
pub use manager::{DownloadEvent, TorrentManager};
pub use name::{Component, Name, TORRENT_FILE_KEYWORD};
pub use peer::{PeerRecord, StatsTable};
pub use storage::StateStore;
pub use transport::{
    Delegation, Membership, NoMembership, OutboundRequest, Transport, TransportEvent,
};
