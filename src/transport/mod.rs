//! Transport contract
//!
//! The name-based transport is an external collaborator. The core hands
//! it outbound requests and prefix registrations; completions, negative
//! acknowledgements, and inbound requests come back as [`TransportEvent`]s
//! on the event stream the driver owns. Exactly one of data/timeout is
//! delivered per expressed request.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CoreError;
use crate::name::Name;

/// A single delegation entry of a forwarding hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    /// Lower is preferred
    pub preference: u32,
    /// Routable name of the peer that should serve the request
    pub name: Name,
}

/// An outbound request handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    /// Requested name
    pub name: Name,
    /// Forwarding hint, absent when no peers are known
    pub forwarding_hint: Option<Delegation>,
    /// How long the transport keeps the request alive
    pub lifetime: Duration,
    /// Demand fresh data rather than cached copies
    pub must_be_fresh: bool,
}

/// Completion and inbound traffic from the transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A reply arrived for an in-flight request
    Data { request: Name, payload: Bytes },
    /// An in-flight request expired without a reply
    Timeout { request: Name },
    /// The network negatively acknowledged an in-flight request
    Nack {
        request: Name,
        hint: Option<Name>,
        reason: String,
    },
    /// An inbound request under one of our advertised prefixes
    RequestReceived { name: Name },
    /// A prefix registration was rejected
    RegisterFailed { prefix: Name, reason: String },
}

/// Operations the core consumes from the name-based transport
#[async_trait]
pub trait Transport: Send {
    /// Express an outbound request
    async fn express_request(&mut self, request: OutboundRequest) -> Result<(), CoreError>;

    /// Advertise a served name prefix
    async fn publish_prefix(&mut self, prefix: Name) -> Result<(), CoreError>;

    /// Reply to an inbound request with encoded descriptor bytes
    async fn put_reply(&mut self, payload: Bytes) -> Result<(), CoreError>;

    /// Stop the transport; outstanding requests are abandoned
    async fn stop(&mut self);
}

/// Interface of the membership subsystem that keeps the peer list fresh
pub trait Membership: Send {
    /// Whether the peer list is stale and an alive-check is due
    fn needs_update(&self) -> bool;

    /// Probe liveness through the given peer
    fn send_alive(&mut self, peer: &Name);
}

/// Membership stub that never requests an alive-check
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMembership;

impl Membership for NoMembership {
    fn needs_update(&self) -> bool {
        false
    }

    fn send_alive(&mut self, _peer: &Name) {}
}
