//! Hierarchical name model
//!
//! Names are ordered sequences of typed components. A name whose final
//! component is a content digest is a *full name*; full-name equality
//! certifies content identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Keyword component marking torrent-file segment names
pub const TORRENT_FILE_KEYWORD: &str = "torrent-file";

/// A single name component
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    /// Opaque bytes, usually UTF-8 path or keyword text
    Generic(Vec<u8>),
    /// Non-negative sequence number
    Sequence(u64),
    /// SHA-256 content digest
    Digest([u8; 32]),
}

impl Component {
    /// Create a generic component from a string
    pub fn from_str_component(s: &str) -> Self {
        Component::Generic(s.as_bytes().to_vec())
    }

    /// Decode this component as a sequence number
    pub fn as_sequence(&self) -> Option<u64> {
        match self {
            Component::Sequence(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the digest bytes if this is a digest component
    pub fn as_digest(&self) -> Option<&[u8; 32]> {
        match self {
            Component::Digest(d) => Some(d),
            _ => None,
        }
    }

    /// Check whether this is a digest component
    pub fn is_digest(&self) -> bool {
        matches!(self, Component::Digest(_))
    }

    /// View a generic component as UTF-8 text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Component::Generic(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Generic(bytes) => {
                write!(f, "{}", String::from_utf8_lossy(bytes))
            }
            Component::Sequence(n) => write!(f, "seq={}", n),
            Component::Digest(d) => write!(f, "sha256={}", hex::encode(d)),
        }
    }
}

/// A hierarchical name: an ordered sequence of components
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// Create an empty name
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    /// Create a name from components
    pub fn from_components(components: Vec<Component>) -> Self {
        Self { components }
    }

    /// Parse a name from its URI form, e.g. `/swarm/demo/torrent-file/seq=0`
    pub fn from_uri(uri: &str) -> Result<Self, CoreError> {
        let mut components = Vec::new();
        for part in uri.split('/').filter(|p| !p.is_empty()) {
            if let Some(num) = part.strip_prefix("seq=") {
                let n = num.parse::<u64>().map_err(|_| {
                    CoreError::name_error_for("Invalid sequence component", uri)
                })?;
                components.push(Component::Sequence(n));
            } else if let Some(hx) = part.strip_prefix("sha256=") {
                let raw = hex::decode(hx).map_err(|_| {
                    CoreError::name_error_for("Invalid digest component", uri)
                })?;
                let digest: [u8; 32] = raw.try_into().map_err(|_| {
                    CoreError::name_error_for("Digest component must be 32 bytes", uri)
                })?;
                components.push(Component::Digest(digest));
            } else {
                components.push(Component::from_str_component(part));
            }
        }
        Ok(Self { components })
    }

    /// Get the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check whether the name has no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get a component by index
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Get the last component
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Iterate over the components
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Append a component
    pub fn push(&mut self, component: Component) {
        self.components.push(component);
    }

    /// Return this name extended by a string component
    pub fn child(&self, s: &str) -> Name {
        let mut name = self.clone();
        name.push(Component::from_str_component(s));
        name
    }

    /// Return this name extended by a sequence component
    pub fn with_sequence(&self, n: u64) -> Name {
        let mut name = self.clone();
        name.push(Component::Sequence(n));
        name
    }

    /// Return this name extended by a digest component
    pub fn with_digest(&self, digest: [u8; 32]) -> Name {
        let mut name = self.clone();
        name.push(Component::Digest(digest));
        name
    }

    /// Check whether this name is a prefix of another
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.components.len() > other.components.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Take a sub-name of `count` components starting at `start`
    pub fn sub_name(&self, start: usize, count: usize) -> Name {
        let end = (start + count).min(self.components.len());
        let start = start.min(self.components.len());
        Name {
            components: self.components[start..end].to_vec(),
        }
    }

    /// Take the first `count` components
    pub fn prefix(&self, count: usize) -> Name {
        self.sub_name(0, count)
    }

    /// Decode the component at `index` as a sequence number
    pub fn sequence_at(&self, index: usize) -> Option<u64> {
        self.components.get(index).and_then(Component::as_sequence)
    }

    /// Check whether this is a full name (ends in a digest)
    pub fn is_full(&self) -> bool {
        matches!(self.components.last(), Some(Component::Digest(_)))
    }

    /// Get the trailing digest of a full name
    pub fn digest(&self) -> Option<&[u8; 32]> {
        self.components.last().and_then(Component::as_digest)
    }

    /// Strip the trailing digest component, if any
    pub fn without_digest(&self) -> Name {
        if self.is_full() {
            self.prefix(self.components.len() - 1)
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uri_round_trip() {
        let uri = "/swarm/demo/torrent-file/seq=2";
        let name = Name::from_uri(uri).unwrap();
        assert_eq!(name.len(), 4);
        assert_eq!(name.to_string(), uri);
    }

    #[test]
    fn test_from_uri_with_digest() {
        let digest = [7u8; 32];
        let uri = format!("/swarm/demo/seq=0/sha256={}", hex::encode(digest));
        let name = Name::from_uri(&uri).unwrap();
        assert!(name.is_full());
        assert_eq!(name.digest(), Some(&digest));
        assert_eq!(name.to_string(), uri);
    }

    #[test]
    fn test_from_uri_invalid_sequence() {
        assert!(Name::from_uri("/a/seq=notanumber").is_err());
    }

    #[test]
    fn test_from_uri_invalid_digest() {
        assert!(Name::from_uri("/a/sha256=zz").is_err());
        assert!(Name::from_uri("/a/sha256=abcd").is_err());
    }

    #[test]
    fn test_is_prefix_of() {
        let prefix = Name::from_uri("/swarm/demo").unwrap();
        let name = Name::from_uri("/swarm/demo/file.txt/seq=0").unwrap();
        assert!(prefix.is_prefix_of(&name));
        assert!(!name.is_prefix_of(&prefix));
        assert!(prefix.is_prefix_of(&prefix));
    }

    #[test]
    fn test_prefix_mismatch() {
        let a = Name::from_uri("/swarm/demo").unwrap();
        let b = Name::from_uri("/swarm/other/file").unwrap();
        assert!(!a.is_prefix_of(&b));
    }

    #[test]
    fn test_sub_name() {
        let name = Name::from_uri("/a/b/c/d").unwrap();
        assert_eq!(name.sub_name(1, 2).to_string(), "/b/c");
        assert_eq!(name.prefix(2).to_string(), "/a/b");
        // out-of-range ranges are clamped
        assert_eq!(name.sub_name(3, 10).to_string(), "/d");
        assert_eq!(name.sub_name(10, 2).len(), 0);
    }

    #[test]
    fn test_sequence_at() {
        let name = Name::from_uri("/file/seq=5/seq=9").unwrap();
        assert_eq!(name.sequence_at(1), Some(5));
        assert_eq!(name.sequence_at(2), Some(9));
        assert_eq!(name.sequence_at(0), None);
    }

    #[test]
    fn test_with_digest_and_strip() {
        let name = Name::from_uri("/a/b").unwrap();
        let full = name.with_digest([1u8; 32]);
        assert!(full.is_full());
        assert!(!name.is_full());
        assert_eq!(full.without_digest(), name);
        assert_eq!(name.without_digest(), name);
    }

    #[test]
    fn test_child_and_with_sequence() {
        let name = Name::from_uri("/swarm").unwrap();
        let extended = name.child("demo").with_sequence(3);
        assert_eq!(extended.to_string(), "/swarm/demo/seq=3");
        assert_eq!(extended.sequence_at(2), Some(3));
    }

    #[test]
    fn test_empty_name_display() {
        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn test_ordering_is_total() {
        let a = Name::from_uri("/a/file/seq=0").unwrap();
        let b = Name::from_uri("/a/file/seq=1").unwrap();
        let c = Name::from_uri("/b/file/seq=0").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_serde_round_trip() {
        let name = Name::from_uri("/swarm/demo/seq=1").unwrap().with_digest([9u8; 32]);
        let encoded = serde_json::to_vec(&name).unwrap();
        let decoded: Name = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(name, decoded);
    }
}
