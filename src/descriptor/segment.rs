//! Torrent-file segments
//!
//! A torrent file is a linked list of signed segments. Each segment's
//! catalog names the first sub-manifest of one or more files; the
//! next-segment pointer is the full name of the following segment, or
//! absent on the last one.

use serde::{Deserialize, Serialize};

use crate::descriptor::{content_signature, sha256, Descriptor};
use crate::error::CoreError;
use crate::name::Name;

/// One signed segment of a torrent file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentSegment {
    name: Name,
    segment_number: u64,
    catalog: Vec<Name>,
    next_segment: Option<Name>,
    signature: Vec<u8>,
    #[serde(skip)]
    full_name: Name,
}

impl TorrentSegment {
    /// Create and sign a new torrent-file segment
    pub fn new(
        name: Name,
        segment_number: u64,
        catalog: Vec<Name>,
        next_segment: Option<Name>,
    ) -> Result<Self, CoreError> {
        let mut segment = Self {
            name,
            segment_number,
            catalog,
            next_segment,
            signature: Vec::new(),
            full_name: Name::new(),
        };
        segment.signature = content_signature(&segment.signable_bytes()?);
        segment.full_name = segment.compute_full_name()?;
        Ok(segment)
    }

    /// Get the segment sequence number
    pub fn segment_number(&self) -> u64 {
        self.segment_number
    }

    /// The ordered first-sub-manifest full names, one per file
    pub fn catalog(&self) -> &[Name] {
        &self.catalog
    }

    /// Full name of the next segment, absent on the last segment
    pub fn next_segment(&self) -> Option<&Name> {
        self.next_segment.as_ref()
    }

    fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&(
            &self.name,
            self.segment_number,
            &self.catalog,
            &self.next_segment,
        ))
        .map_err(CoreError::from)
    }

    fn compute_full_name(&self) -> Result<Name, CoreError> {
        let mut bytes = self.signable_bytes()?;
        bytes.extend_from_slice(&self.signature);
        Ok(self.name.with_digest(sha256(&bytes)))
    }
}

impl Descriptor for TorrentSegment {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut segment: Self = serde_json::from_slice(bytes)?;
        segment.full_name = segment.compute_full_name()?;
        Ok(segment)
    }

    fn encode(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(self).map_err(CoreError::from)
    }

    fn name(&self) -> &Name {
        &self.name
    }

    fn full_name(&self) -> &Name {
        &self.full_name
    }

    fn verify(&self) -> bool {
        match self.signable_bytes() {
            Ok(signable) => content_signature(&signable) == self.signature,
            Err(_) => false,
        }
    }
}

impl PartialEq for TorrentSegment {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for TorrentSegment {}
