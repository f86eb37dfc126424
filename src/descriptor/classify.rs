//! Name-shape classification
//!
//! The seeder and the serving path need to know which descriptor kind a
//! name refers to without holding the descriptor itself. The kind is
//! decided purely from the name shape: torrent-file segment names carry
//! the `torrent-file` keyword before their sequence number, data-packet
//! names end in two sequence components, manifest names in one.

use crate::name::{Component, Name, TORRENT_FILE_KEYWORD};

/// The descriptor kind a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    TorrentSegment,
    FileManifest,
    DataPacket,
    Unknown,
}

/// Classify a name (full or not) by its shape
pub fn classify(name: &Name) -> NameKind {
    let core = name.without_digest();
    let len = core.len();
    if len < 2 {
        return NameKind::Unknown;
    }

    let last_is_sequence = core.sequence_at(len - 1).is_some();
    if !last_is_sequence {
        return NameKind::Unknown;
    }

    let before_last = core.get(len - 2);
    if before_last.and_then(Component::as_str) == Some(TORRENT_FILE_KEYWORD) {
        return NameKind::TorrentSegment;
    }
    if before_last.and_then(Component::as_sequence).is_some() {
        return NameKind::DataPacket;
    }
    NameKind::FileManifest
}
