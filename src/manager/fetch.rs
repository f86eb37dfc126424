//! Fetcher continuations and download events
//!
//! Each in-flight request carries a [`FetchContext`]: the explicit state
//! of the fetcher that issued it. Chain fetchers thread their
//! accumulators through the context instead of capturing them in
//! closures. Caller-facing results flow out as [`DownloadEvent`]s.

use crate::name::Name;

/// The continuation of an outbound request
#[derive(Debug)]
pub enum FetchContext {
    /// Torrent-segment chain fetch
    Segment,
    /// Sub-manifest chain fetch for the manifest originally requested,
    /// accumulating data-packet names across the chain
    Manifest {
        origin: Name,
        accumulated: Vec<Name>,
    },
    /// Single data-packet fetch
    Packet,
}

/// Results delivered to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// A torrent segment arrived (or the chain was already complete):
    /// these manifests are ready to download
    ManifestsDiscovered { manifests: Vec<Name> },
    /// A sub-manifest chain finished: these packet names belong to the
    /// manifest originally requested
    PacketsDiscovered { manifest: Name, packets: Vec<Name> },
    /// A data packet is held (downloaded or already on disk)
    PacketComplete { name: Name },
    /// A request failed terminally
    Failed { name: Name, reason: String },
}
