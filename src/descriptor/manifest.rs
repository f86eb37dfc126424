//! File manifests
//!
//! Each file is described by a chain of signed sub-manifests. A
//! sub-manifest's catalog names the data packets it covers; the
//! next-sub-manifest pointer links the chain, absent on the last one.

use serde::{Deserialize, Serialize};

use crate::descriptor::{content_signature, sha256, Descriptor};
use crate::error::CoreError;
use crate::name::Name;

/// One signed sub-manifest of a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileManifest {
    name: Name,
    file_name: String,
    sub_manifest_number: u64,
    data_packet_size: usize,
    catalog: Vec<Name>,
    next_sub_manifest: Option<Name>,
    signature: Vec<u8>,
    #[serde(skip)]
    full_name: Name,
}

impl FileManifest {
    /// Create and sign a new sub-manifest
    pub fn new(
        name: Name,
        file_name: String,
        sub_manifest_number: u64,
        data_packet_size: usize,
        catalog: Vec<Name>,
        next_sub_manifest: Option<Name>,
    ) -> Result<Self, CoreError> {
        let mut manifest = Self {
            name,
            file_name,
            sub_manifest_number,
            data_packet_size,
            catalog,
            next_sub_manifest,
            signature: Vec::new(),
            full_name: Name::new(),
        };
        manifest.signature = content_signature(&manifest.signable_bytes()?);
        manifest.full_name = manifest.compute_full_name()?;
        Ok(manifest)
    }

    /// Relative path of the file this manifest describes
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 0-based position in the file's sub-manifest chain
    pub fn sub_manifest_number(&self) -> u64 {
        self.sub_manifest_number
    }

    /// Configured maximum data-packet payload size
    pub fn data_packet_size(&self) -> usize {
        self.data_packet_size
    }

    /// The ordered data-packet full names covered by this sub-manifest
    pub fn catalog(&self) -> &[Name] {
        &self.catalog
    }

    /// Full name of the next sub-manifest, absent on the last one
    pub fn next_sub_manifest(&self) -> Option<&Name> {
        self.next_sub_manifest.as_ref()
    }

    /// The per-file manifest prefix of a sub-manifest name
    ///
    /// Strips the trailing digest (if present) and the sub-manifest
    /// sequence component.
    pub fn manifest_prefix(name: &Name) -> Name {
        let core = name.without_digest();
        if core.is_empty() {
            return core;
        }
        core.prefix(core.len() - 1)
    }

    fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&(
            &self.name,
            &self.file_name,
            self.sub_manifest_number,
            self.data_packet_size,
            &self.catalog,
            &self.next_sub_manifest,
        ))
        .map_err(CoreError::from)
    }

    fn compute_full_name(&self) -> Result<Name, CoreError> {
        let mut bytes = self.signable_bytes()?;
        bytes.extend_from_slice(&self.signature);
        Ok(self.name.with_digest(sha256(&bytes)))
    }
}

impl Descriptor for FileManifest {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut manifest: Self = serde_json::from_slice(bytes)?;
        manifest.full_name = manifest.compute_full_name()?;
        Ok(manifest)
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

impl PartialEq for FileManifest {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for FileManifest {}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_name(file: &str, sub: u64) -> Name {
        Name::from_uri("/swarm/demo")
            .unwrap()
            .child(file)
            .with_sequence(sub)
    }

    fn packet_name(file: &str, sub: u64, packet: u64) -> Name {
        manifest_name(file, sub)
            .with_sequence(packet)
            .with_digest([packet as u8; 32])
    }

    #[test]
    fn test_new_is_signed() {
        let manifest = FileManifest::new(
            manifest_name("a.txt", 0),
            "a.txt".to_string(),
            0,
            1024,
            vec![packet_name("a.txt", 0, 0), packet_name("a.txt", 0, 1)],
            None,
        )
        .unwrap();
        assert!(manifest.verify());
        assert!(manifest.full_name().is_full());
        assert_eq!(manifest.data_packet_size(), 1024);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let manifest = FileManifest::new(
            manifest_name("dir/b.bin", 1),
            "dir/b.bin".to_string(),
            1,
            256,
            vec![packet_name("dir/b.bin", 1, 0)],
            Some(manifest_name("dir/b.bin", 2).with_digest([8u8; 32])),
        )
        .unwrap();

        let decoded = FileManifest::decode(&manifest.encode().unwrap()).unwrap();
        assert_eq!(decoded, manifest);
        assert_eq!(decoded.full_name(), manifest.full_name());
        assert_eq!(decoded.file_name(), "dir/b.bin");
        assert_eq!(decoded.sub_manifest_number(), 1);
        assert!(decoded.next_sub_manifest().is_some());
        assert!(decoded.verify());
    }

    #[test]
    fn test_manifest_prefix_strips_sequence_and_digest() {
        let name = manifest_name("a.txt", 3).with_digest([1u8; 32]);
        let prefix = FileManifest::manifest_prefix(&name);
        assert_eq!(prefix.to_string(), "/swarm/demo/a.txt");

        // also works on names without the digest
        let bare = manifest_name("a.txt", 3);
        assert_eq!(FileManifest::manifest_prefix(&bare), prefix);
    }

    #[test]
    fn test_catalog_order_preserved() {
        let catalog = vec![
            packet_name("a.txt", 0, 0),
            packet_name("a.txt", 0, 1),
            packet_name("a.txt", 0, 2),
        ];
        let manifest = FileManifest::new(
            manifest_name("a.txt", 0),
            "a.txt".to_string(),
            0,
            64,
            catalog.clone(),
            None,
        )
        .unwrap();
        assert_eq!(manifest.catalog(), catalog.as_slice());
    }
}
