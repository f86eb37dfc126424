//! Signed descriptor model
//!
//! The torrent tree is made of three descriptor kinds: torrent-file
//! segments at the root, per-file sub-manifest chains, and fixed-size
//! data packets. All three carry a SHA-256 content signature and are
//! addressed by their full name (name + implicit digest over the
//! encoding).

pub mod classify;
pub mod manifest;
pub mod packet;
pub mod segment;

pub use classify::{classify, NameKind};
pub use manifest::FileManifest;
pub use packet::DataPacket;
pub use segment::TorrentSegment;

use sha2::{Digest as _, Sha256};

use crate::error::CoreError;
use crate::name::Name;

/// Compute the SHA-256 digest of a byte slice
pub(crate) fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Compute a SHA-256 content signature over the signable bytes
pub(crate) fn content_signature(signable: &[u8]) -> Vec<u8> {
    sha256(signable).to_vec()
}

/// Common interface of the three descriptor kinds
pub trait Descriptor: Sized {
    /// Decode a descriptor from its wire bytes
    fn decode(bytes: &[u8]) -> Result<Self, CoreError>;

    /// Encode the descriptor to wire bytes
    fn encode(&self) -> Result<Vec<u8>, CoreError>;

    /// The descriptor name (without the implicit digest)
    fn name(&self) -> &Name;

    /// The full name: name plus implicit digest over the encoding
    fn full_name(&self) -> &Name;

    /// Check the content signature
    fn verify(&self) -> bool;
}
