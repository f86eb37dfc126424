//! Peer statistics table
//!
//! An ordered set of peer records with sent/received counters and a
//! wrap-around cursor. The cursor picks the forwarding-hint target for
//! the next outbound request; sorting reorders the table by merit and
//! resets the cursor to the head.

use std::cmp::Ordering;

use crate::name::Name;

/// Statistics for a single peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    name: Name,
    sent: u64,
    received: u64,
}

impl PeerRecord {
    /// Create a new record with zeroed counters
    pub fn new(name: Name) -> Self {
        Self {
            name,
            sent: 0,
            received: 0,
        }
    }

    /// The peer's routable name
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Number of requests sent toward this peer
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Number of replies received from this peer
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Count one request sent toward this peer
    pub fn increment_sent(&mut self) {
        self.sent += 1;
    }

    /// Count one reply received from this peer
    pub fn increment_received(&mut self) {
        self.received += 1;
    }
}

/// Sortable table of peer records with a round-robin cursor
#[derive(Debug, Default)]
pub struct StatsTable {
    records: Vec<PeerRecord>,
    cursor: usize,
}

impl StatsTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table seeded with peer names
    pub fn with_peers(names: Vec<Name>) -> Self {
        let mut table = Self::new();
        for name in names {
            table.insert(name);
        }
        table
    }

    /// Insert a peer, returning false if already present
    pub fn insert(&mut self, name: Name) -> bool {
        if self.records.iter().any(|r| r.name == name) {
            return false;
        }
        self.records.push(PeerRecord::new(name));
        true
    }

    /// Erase a peer by name, returning whether it was present
    pub fn erase(&mut self, name: &Name) -> bool {
        let before = self.records.len();
        self.records.retain(|r| &r.name != name);
        let removed = self.records.len() != before;
        if removed && self.cursor >= self.records.len() {
            self.cursor = 0;
        }
        removed
    }

    /// Find a record by peer name
    pub fn find(&self, name: &Name) -> Option<&PeerRecord> {
        self.records.iter().find(|r| &r.name == name)
    }

    /// Number of peers
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over the records in table order
    pub fn iter(&self) -> impl Iterator<Item = &PeerRecord> {
        self.records.iter()
    }

    /// Stable re-sort by the default merit order, resetting the cursor
    ///
    /// Merit: more replies first, then fewer requests sent, then name.
    pub fn sort(&mut self) {
        self.sort_by(|a, b| {
            b.received
                .cmp(&a.received)
                .then(a.sent.cmp(&b.sent))
                .then(a.name.cmp(&b.name))
        });
    }

    /// Stable re-sort under a caller-supplied total order
    ///
    /// Any outstanding cursor position is invalidated: the cursor moves
    /// back to the head.
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&PeerRecord, &PeerRecord) -> Ordering,
    {
        self.records.sort_by(compare);
        self.cursor = 0;
    }

    /// The record under the cursor
    pub fn current(&self) -> Option<&PeerRecord> {
        self.records.get(self.cursor)
    }

    /// Mutable access to the record under the cursor
    pub fn current_mut(&mut self) -> Option<&mut PeerRecord> {
        self.records.get_mut(self.cursor)
    }

    /// Advance the cursor one step, wrapping to the head at the end
    pub fn advance(&mut self) {
        if self.records.is_empty() {
            self.cursor = 0;
            return;
        }
        self.cursor = (self.cursor + 1) % self.records.len();
    }

    /// Move the cursor back to the head
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }
}
