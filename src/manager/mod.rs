//! Torrent manager
//!
//! The state machine at the core of the node: reconciles on-disk state
//! at startup, schedules outbound requests through a windowed queue with
//! per-peer statistics, verifies and persists incoming descriptors,
//! advertises served prefixes at the moment the node becomes
//! authoritative for them, and handles retries, peer failover, and
//! transport-level negative acknowledgements.
//!
//! All state is touched only from [`TorrentManager::handle_event`] and
//! the download entry points; each event runs to completion before the
//! next is dispatched.

pub mod fetch;
pub mod queue;
pub mod scheduler;

pub use fetch::{DownloadEvent, FetchContext};
pub use queue::{InFlight, PendingMap, QueuedRequest, RequestQueue};
pub use scheduler::Scheduler;

use std::collections::HashSet;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::descriptor::{
    classify, DataPacket, Descriptor, FileManifest, NameKind, TorrentSegment,
};
use crate::name::Name;
use crate::peer::StatsTable;
use crate::storage::StateStore;
use crate::transport::{Delegation, Membership, OutboundRequest, Transport, TransportEvent};

/// The torrent manager state machine
pub struct TorrentManager<T: Transport, M: Membership> {
    config: Config,
    store: StateStore,
    stats: StatsTable,
    queue: RequestQueue,
    pending: PendingMap,
    scheduler: Scheduler,
    transport: T,
    membership: M,
    events: mpsc::UnboundedSender<DownloadEvent>,
    advertised: HashSet<Name>,
    stopped: bool,
}

impl<T: Transport, M: Membership> TorrentManager<T, M> {
    /// Create a manager for the configured torrent
    pub fn new(
        config: Config,
        transport: T,
        membership: M,
        peers: Vec<Name>,
        events: mpsc::UnboundedSender<DownloadEvent>,
    ) -> Result<Self> {
        config.validate()?;
        let store = StateStore::new(&config);
        let scheduler = Scheduler::new(
            config.window_size,
            config.max_retries,
            config.sorting_interval,
        );
        Ok(Self {
            config,
            store,
            stats: StatsTable::with_peers(peers),
            queue: RequestQueue::new(),
            pending: PendingMap::new(),
            scheduler,
            transport,
            membership,
            events,
            advertised: HashSet::new(),
            stopped: false,
        })
    }

    /// Reconcile on-disk state and seed everything reconciled
    pub async fn initialize(&mut self) -> Result<()> {
        info!(
            "Initializing torrent manager for {}",
            self.config.initial_segment_name
        );
        let reconciled = self.store.reconcile().await?;
        for name in reconciled {
            self.seed(&name).await?;
        }
        Ok(())
    }

    /// Drive the manager from the transport's event stream
    pub async fn run(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<()> {
        while !self.stopped {
            match events.recv().await {
                Some(event) => self.handle_event(event).await?,
                None => break,
            }
        }
        Ok(())
    }

    /// Dispatch one transport event to completion
    pub async fn handle_event(&mut self, event: TransportEvent) -> Result<()> {
        match event {
            TransportEvent::Data { request, payload } => self.on_data(request, payload).await,
            TransportEvent::Timeout { request } => self.on_timeout(request).await,
            TransportEvent::Nack { request, hint, reason } => {
                self.on_nack(request, hint, reason).await
            }
            TransportEvent::RequestReceived { name } => self.on_request_received(name).await,
            TransportEvent::RegisterFailed { prefix, reason } => {
                error!("Failed to register prefix {}: {}", prefix, reason);
                self.shutdown().await;
                Ok(())
            }
        }
    }

    /// Download the torrent-file segment chain
    ///
    /// Requests the next missing segment, or reports the manifests left
    /// to download when the chain is already complete.
    pub async fn download_torrent_file(&mut self) -> Result<()> {
        self.alive_check();
        match self.store.next_segment_to_fetch() {
            Some(name) => self.enqueue_fetch(name, FetchContext::Segment).await,
            None => {
                let manifests = self.store.manifests_to_fetch();
                self.emit(DownloadEvent::ManifestsDiscovered { manifests });
                Ok(())
            }
        }
    }

    /// Download a file's sub-manifest chain starting at `manifest_name`
    ///
    /// Sub-manifests already held answer synchronously; the accumulated
    /// data-packet names arrive as one [`DownloadEvent::PacketsDiscovered`].
    pub async fn download_file_manifest(&mut self, manifest_name: Name) -> Result<()> {
        self.alive_check();
        match self.store.manifest_segment_to_fetch(&manifest_name) {
            None => {
                let packets = self.store.missing_packets(&manifest_name);
                self.emit(DownloadEvent::PacketsDiscovered {
                    manifest: manifest_name,
                    packets,
                });
                Ok(())
            }
            Some(next) => {
                self.enqueue_fetch(
                    next,
                    FetchContext::Manifest {
                        origin: manifest_name,
                        accumulated: Vec::new(),
                    },
                )
                .await
            }
        }
    }

    /// Download a single data packet
    ///
    /// A packet already on disk completes synchronously without issuing
    /// a request.
    pub async fn download_data_packet(&mut self, packet_name: Name) -> Result<()> {
        if self.store.has_packet(&packet_name) {
            self.emit(DownloadEvent::PacketComplete { name: packet_name });
            return Ok(());
        }
        self.enqueue_fetch(packet_name, FetchContext::Packet).await
    }

    /// Drop a peer from the stats table
    ///
    /// Used when the membership subsystem learns our own routable
    /// prefix; the cursor and the failure streak start over.
    pub fn remove_peer(&mut self, name: &Name) {
        if self.stats.erase(name) {
            debug!("Erased peer {} from stats table", name);
        }
        self.stats.reset_cursor();
        self.scheduler.reset_retries();
    }

    /// The held state
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The peer statistics table
    pub fn stats(&self) -> &StatsTable {
        &self.stats
    }

    /// Number of in-flight requests
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Number of requests awaiting window admission
    pub fn queued_requests(&self) -> usize {
        self.queue.len()
    }

    /// Whether the manager has shut down
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    async fn on_data(&mut self, request: Name, payload: Bytes) -> Result<()> {
        let inflight = match self.pending.remove(&request) {
            Some(inflight) => inflight,
            None => {
                debug!("Ignoring data for unknown request {}", request);
                return Ok(());
            }
        };
        if let Some(record) = self.stats.current_mut() {
            record.increment_received();
        }
        self.scheduler.on_success();

        match inflight.context {
            FetchContext::Segment => self.on_segment_data(&request, &payload).await?,
            FetchContext::Manifest { origin, accumulated } => {
                self.on_manifest_data(&request, &payload, origin, accumulated)
                    .await?
            }
            FetchContext::Packet => self.on_packet_data(&request, &payload).await?,
        }

        self.pump().await?;
        self.maybe_shutdown().await;
        Ok(())
    }

    async fn on_segment_data(&mut self, request: &Name, payload: &[u8]) -> Result<()> {
        let segment = match TorrentSegment::decode(payload) {
            Ok(segment) => segment,
            Err(e) => {
                debug!("Dropping undecodable segment for {}: {}", request, e);
                return Ok(());
            }
        };
        if !segment.verify() {
            debug!("Dropping segment {} with invalid signature", segment.name());
            return Ok(());
        }

        let manifests = segment.catalog().to_vec();
        let next = segment.next_segment().cloned();
        let full_name = segment.full_name().clone();
        match self.store.insert_segment(segment).await {
            Ok(true) => self.seed(&full_name).await?,
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to persist segment {}: {}", full_name, e);
                self.emit(DownloadEvent::Failed {
                    name: request.clone(),
                    reason: e.to_string(),
                });
            }
        }

        self.emit(DownloadEvent::ManifestsDiscovered { manifests });
        if let Some(next) = next {
            self.enqueue_fetch(next, FetchContext::Segment).await?;
        }
        Ok(())
    }

    async fn on_manifest_data(
        &mut self,
        request: &Name,
        payload: &[u8],
        origin: Name,
        mut accumulated: Vec<Name>,
    ) -> Result<()> {
        let manifest = match FileManifest::decode(payload) {
            Ok(manifest) => manifest,
            Err(e) => {
                debug!("Dropping undecodable manifest for {}: {}", request, e);
                return Ok(());
            }
        };
        if !manifest.verify() {
            debug!("Dropping manifest {} with invalid signature", manifest.name());
            return Ok(());
        }

        accumulated.extend(manifest.catalog().iter().cloned());
        let next = manifest.next_sub_manifest().cloned();
        let full_name = manifest.full_name().clone();
        match self.store.insert_manifest(manifest).await {
            Ok(true) => self.seed(&full_name).await?,
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to persist manifest {}: {}", full_name, e);
                self.emit(DownloadEvent::Failed {
                    name: request.clone(),
                    reason: e.to_string(),
                });
            }
        }

        match next {
            Some(next) => {
                self.enqueue_fetch(next, FetchContext::Manifest { origin, accumulated })
                    .await?
            }
            None => self.emit(DownloadEvent::PacketsDiscovered {
                manifest: origin,
                packets: accumulated,
            }),
        }
        Ok(())
    }

    async fn on_packet_data(&mut self, request: &Name, payload: &[u8]) -> Result<()> {
        let packet = match DataPacket::decode(payload) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping undecodable packet for {}: {}", request, e);
                return Ok(());
            }
        };
        if !packet.verify() {
            debug!("Dropping packet {} with invalid signature", packet.name());
            return Ok(());
        }

        match self.store.store_packet(&packet).await {
            Ok(stored) => {
                if stored {
                    let full_name = packet.full_name().clone();
                    self.seed(&full_name).await?;
                }
                self.emit(DownloadEvent::PacketComplete {
                    name: packet.name().clone(),
                });
            }
            Err(e) => {
                warn!("Failed to persist packet {}: {}", packet.name(), e);
                self.emit(DownloadEvent::Failed {
                    name: request.clone(),
                    reason: e.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn on_timeout(&mut self, request: Name) -> Result<()> {
        if self.pending.remove(&request).is_none() {
            debug!("Ignoring timeout for unknown request {}", request);
            return Ok(());
        }
        if self.scheduler.on_failure() {
            self.stats.advance();
        }
        self.emit(DownloadEvent::Failed {
            name: request,
            reason: "request timed out".to_string(),
        });
        self.pump().await?;
        self.maybe_shutdown().await;
        Ok(())
    }

    async fn on_nack(
        &mut self,
        request: Name,
        hint: Option<Name>,
        reason: String,
    ) -> Result<()> {
        debug!("Nack received for {}: {}", request, reason);
        if !self.pending.contains(&request) {
            debug!("Dropping NACK for unknown request {}", request);
            return Ok(());
        }

        let current = self.stats.current().map(|r| r.name().clone());
        if hint.is_some() && hint == current {
            self.stats.advance();
        }
        if let Some(record) = self.stats.current_mut() {
            record.increment_sent();
        }
        self.alive_check();

        let forwarding_hint = self.stats.current().map(|r| Delegation {
            preference: 1,
            name: r.name().clone(),
        });
        let new_request = OutboundRequest {
            name: request.clone(),
            forwarding_hint,
            lifetime: self.config.request_lifetime,
            must_be_fresh: true,
        };
        if let Some(inflight) = self.pending.get_mut(&request) {
            inflight.request = new_request.clone();
        }
        debug!(
            "Re-expressing {} toward {:?}",
            request,
            new_request.forwarding_hint.as_ref().map(|d| d.name.to_string())
        );
        self.transport.express_request(new_request).await?;
        Ok(())
    }

    async fn on_request_received(&mut self, name: Name) -> Result<()> {
        debug!("Request received: {}", name);
        if let Some(segment) = self.store.segment_by_full_name(&name) {
            let bytes = segment.encode()?;
            self.transport.put_reply(Bytes::from(bytes)).await?;
            return Ok(());
        }
        if let Some(manifest) = self.store.manifest_by_full_name(&name) {
            let bytes = manifest.encode()?;
            self.transport.put_reply(Bytes::from(bytes)).await?;
            return Ok(());
        }
        match self.store.read_served_packet(&name).await? {
            Some(packet) => {
                let bytes = packet.encode()?;
                self.transport.put_reply(Bytes::from(bytes)).await?;
            }
            None => {
                // TODO(nack): reply with a NACK instead of dropping
                warn!("Unable to serve request {}; dropping", name);
            }
        }
        Ok(())
    }

    /// Advertise the prefix a newly-held item completes, if any
    async fn seed(&mut self, full_name: &Name) -> Result<()> {
        let prefix = match classify(full_name) {
            NameKind::TorrentSegment => self
                .store
                .has_all_torrent_segments()
                .then(|| self.config.torrent_file_prefix()),
            NameKind::FileManifest => self
                .store
                .has_all_manifest_segments(full_name)
                .then(|| FileManifest::manifest_prefix(full_name)),
            NameKind::DataPacket | NameKind::Unknown => None,
        };
        if let Some(prefix) = prefix {
            if self.advertised.insert(prefix.clone()) {
                info!("Advertising prefix {}", prefix);
                self.transport.publish_prefix(prefix).await?;
            }
        }
        Ok(())
    }

    async fn enqueue_fetch(&mut self, name: Name, context: FetchContext) -> Result<()> {
        let request = self.create_request(name);
        debug!("Pushing to the request queue: {}", request.name);
        self.queue.push(QueuedRequest { request, context });
        self.pump().await
    }

    fn create_request(&mut self, name: Name) -> OutboundRequest {
        let forwarding_hint = self.stats.current().map(|r| Delegation {
            preference: 1,
            name: r.name().clone(),
        });
        if let Some(record) = self.stats.current_mut() {
            record.increment_sent();
        }
        if self.scheduler.on_request_created() {
            self.alive_check();
            self.stats.sort();
        }
        OutboundRequest {
            name,
            forwarding_hint,
            lifetime: self.config.request_lifetime,
            must_be_fresh: true,
        }
    }

    /// Admit queued requests into the transport up to the window
    async fn pump(&mut self) -> Result<()> {
        while self.pending.len() < self.scheduler.window_size() && !self.queue.is_empty() {
            if let Some(entry) = self.queue.pop() {
                let request = entry.request.clone();
                debug!("Sending request: {}", request.name);
                self.pending.insert(
                    request.name.clone(),
                    InFlight {
                        request: entry.request,
                        context: entry.context,
                    },
                );
                self.transport.express_request(request).await?;
            }
        }
        Ok(())
    }

    fn alive_check(&mut self) {
        if self.membership.needs_update() {
            if let Some(peer) = self.stats.current().map(|r| r.name().clone()) {
                self.membership.send_alive(&peer);
            }
        }
    }

    async fn maybe_shutdown(&mut self) {
        if self.pending.is_empty() && !self.config.seed {
            self.shutdown().await;
        }
    }

    async fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        info!("Shutting down torrent manager");
        self.stopped = true;
        self.transport.stop().await;
    }

    fn emit(&self, event: DownloadEvent) {
        if self.events.send(event).is_err() {
            debug!("Download event receiver dropped");
        }
    }
}
