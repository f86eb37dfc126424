//! Request queue and pending map
//!
//! The queue is a strict FIFO of created-but-not-yet-expressed requests;
//! the pending map indexes in-flight requests by name. A request name
//! lives in exactly one of the two from enqueue until its terminal
//! callback.

use std::collections::{HashMap, VecDeque};

use crate::manager::fetch::FetchContext;
use crate::name::Name;
use crate::transport::OutboundRequest;

/// A created request waiting for window admission
#[derive(Debug)]
pub struct QueuedRequest {
    pub request: OutboundRequest,
    pub context: FetchContext,
}

/// FIFO of pending outbound requests
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: VecDeque<QueuedRequest>,
}

impl RequestQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request at the tail
    pub fn push(&mut self, entry: QueuedRequest) {
        self.entries.push_back(entry);
    }

    /// Remove and return the request at the head
    pub fn pop(&mut self) -> Option<QueuedRequest> {
        self.entries.pop_front()
    }

    /// Check whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of queued requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// An in-flight request and its continuation
#[derive(Debug)]
pub struct InFlight {
    pub request: OutboundRequest,
    pub context: FetchContext,
}

/// Index of in-flight request names to their continuations
#[derive(Debug, Default)]
pub struct PendingMap {
    entries: HashMap<Name, InFlight>,
}

impl PendingMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an in-flight request, returning false if the name is taken
    pub fn insert(&mut self, name: Name, entry: InFlight) -> bool {
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, entry);
        true
    }

    /// Check whether a request name is in flight
    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    /// Mutable access to an in-flight entry
    pub fn get_mut(&mut self, name: &Name) -> Option<&mut InFlight> {
        self.entries.get_mut(name)
    }

    /// Remove an entry on its terminal outcome
    pub fn remove(&mut self, name: &Name) -> Option<InFlight> {
        self.entries.remove(name)
    }

    /// Number of in-flight requests
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is in flight
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(uri: &str) -> QueuedRequest {
        QueuedRequest {
            request: OutboundRequest {
                name: Name::from_uri(uri).unwrap(),
                forwarding_hint: None,
                lifetime: Duration::from_millis(2000),
                must_be_fresh: true,
            },
            context: FetchContext::Packet,
        }
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = RequestQueue::new();
        queue.push(entry("/a/seq=0/seq=1"));
        queue.push(entry("/b/seq=0/seq=2"));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().request.name.to_string(), "/a/seq=0/seq=1");
        assert_eq!(queue.pop().unwrap().request.name.to_string(), "/b/seq=0/seq=2");
        assert!(queue.pop().is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_does_not_deduplicate() {
        let mut queue = RequestQueue::new();
        queue.push(entry("/a/seq=0/seq=1"));
        queue.push(entry("/a/seq=0/seq=1"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_pending_single_entry_per_name() {
        let mut pending = PendingMap::new();
        let first = entry("/a/seq=0/seq=1");
        let name = first.request.name.clone();
        assert!(pending.insert(
            name.clone(),
            InFlight { request: first.request, context: first.context }
        ));
        let second = entry("/a/seq=0/seq=1");
        assert!(!pending.insert(
            name.clone(),
            InFlight { request: second.request, context: second.context }
        ));
        assert_eq!(pending.len(), 1);
        assert!(pending.contains(&name));
    }

    #[test]
    fn test_pending_remove_is_terminal() {
        let mut pending = PendingMap::new();
        let queued = entry("/a/seq=0/seq=1");
        let name = queued.request.name.clone();
        pending.insert(
            name.clone(),
            InFlight { request: queued.request, context: queued.context },
        );
        assert!(pending.remove(&name).is_some());
        assert!(pending.remove(&name).is_none());
        assert!(pending.is_empty());
    }
}
