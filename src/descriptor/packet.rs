//! Data packets
//!
//! A data packet is a signed, named payload of fixed maximum size. Its
//! index within the owning sub-manifest is the trailing sequence
//! component of its name.

use serde::{Deserialize, Serialize};

use crate::descriptor::{content_signature, sha256, Descriptor};
use crate::error::CoreError;
use crate::name::Name;

/// One signed data packet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPacket {
    name: Name,
    payload: Vec<u8>,
    signature: Vec<u8>,
    #[serde(skip)]
    full_name: Name,
}

impl DataPacket {
    /// Create and sign a new data packet
    pub fn new(name: Name, payload: Vec<u8>) -> Result<Self, CoreError> {
        let mut packet = Self {
            name,
            payload,
            signature: Vec::new(),
            full_name: Name::new(),
        };
        packet.signature = content_signature(&packet.signable_bytes()?);
        packet.full_name = packet.compute_full_name()?;
        Ok(packet)
    }

    /// The packet payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Packet index within its sub-manifest, from the trailing sequence
    pub fn packet_index(&self) -> Option<u64> {
        let core = self.name.without_digest();
        if core.is_empty() {
            return None;
        }
        core.sequence_at(core.len() - 1)
    }

    fn signable_bytes(&self) -> Result<Vec<u8>, CoreError> {
        serde_json::to_vec(&(&self.name, &self.payload)).map_err(CoreError::from)
    }

    fn compute_full_name(&self) -> Result<Name, CoreError> {
        let mut bytes = self.signable_bytes()?;
        bytes.extend_from_slice(&self.signature);
        Ok(self.name.with_digest(sha256(&bytes)))
    }
}

impl Descriptor for DataPacket {
    fn decode(bytes: &[u8]) -> Result<Self, CoreError> {
        let mut packet: Self = serde_json::from_slice(bytes)?;
        packet.full_name = packet.compute_full_name()?;
        Ok(packet)
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

impl PartialEq for DataPacket {
    fn eq(&self, other: &Self) -> bool {
        self.full_name == other.full_name
    }
}

impl Eq for DataPacket {}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet_name(sub: u64, packet: u64) -> Name {
        Name::from_uri("/swarm/demo/a.txt")
            .unwrap()
            .with_sequence(sub)
            .with_sequence(packet)
    }

    #[test]
    fn test_new_is_signed() {
        let packet = DataPacket::new(packet_name(0, 4), vec![1, 2, 3]).unwrap();
        assert!(packet.verify());
        assert_eq!(packet.packet_index(), Some(4));
        assert_eq!(packet.payload(), &[1, 2, 3]);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let packet = DataPacket::new(packet_name(1, 0), vec![9u8; 128]).unwrap();
        let decoded = DataPacket::decode(&packet.encode().unwrap()).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(decoded.full_name(), packet.full_name());
        assert!(decoded.verify());
    }

    #[test]
    fn test_same_bytes_same_full_name() {
        let a = DataPacket::new(packet_name(0, 0), vec![7u8; 16]).unwrap();
        let b = DataPacket::new(packet_name(0, 0), vec![7u8; 16]).unwrap();
        assert_eq!(a.full_name(), b.full_name());
    }

    #[test]
    fn test_different_payload_different_full_name() {
        let a = DataPacket::new(packet_name(0, 0), vec![7u8; 16]).unwrap();
        let b = DataPacket::new(packet_name(0, 0), vec![8u8; 16]).unwrap();
        assert_ne!(a.full_name(), b.full_name());
    }
}
