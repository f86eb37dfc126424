//! In-memory torrent state and disk reconciliation
//!
//! The store holds the verified torrent-segment chain prefix, the
//! per-file sub-manifest chain prefixes, and one bitmap per held
//! sub-manifest. Startup reconciliation rebuilds all three from the
//! descriptor directories and the payload files; the persist paths keep
//! disk and memory in step afterwards.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::descriptor::{DataPacket, Descriptor, FileManifest, TorrentSegment};
use crate::error::CoreError;
use crate::name::Name;
use crate::storage::codec;

/// In-memory collections of held descriptors and file bitmaps
#[derive(Debug)]
pub struct StateStore {
    initial_segment_name: Name,
    torrent_file_prefix: Name,
    data_path: PathBuf,
    torrent_files_dir: PathBuf,
    manifests_dir: PathBuf,
    segments: Vec<TorrentSegment>,
    manifests: Vec<FileManifest>,
    file_states: HashMap<Name, Vec<bool>>,
    sub_manifest_sizes: HashMap<String, usize>,
}

impl StateStore {
    /// Create an empty store for the configured torrent
    pub fn new(config: &Config) -> Self {
        Self {
            initial_segment_name: config.initial_segment_name.clone(),
            torrent_file_prefix: config.torrent_file_prefix(),
            data_path: config.data_path.clone(),
            torrent_files_dir: config.torrent_files_dir(),
            manifests_dir: config.manifests_dir(),
            segments: Vec::new(),
            manifests: Vec::new(),
            file_states: HashMap::new(),
            sub_manifest_sizes: HashMap::new(),
        }
    }

    /// Reconcile in-memory state with the disk
    ///
    /// Loads and verifies the segment chain prefix, the per-file
    /// sub-manifest chain prefixes, and re-packetises existing payload
    /// files to rebuild the bitmaps. Returns the full names of every
    /// reconciled item so the caller can seed them.
    pub async fn reconcile(&mut self) -> Result<Vec<Name>, CoreError> {
        if !self.torrent_files_dir.exists() {
            debug!("No torrent directory at {}", self.torrent_files_dir.display());
            return Ok(Vec::new());
        }

        self.segments = self.reconcile_segments().await?;
        if self.segments.is_empty() {
            return Ok(Vec::new());
        }
        self.manifests = self.reconcile_manifests().await?;

        for manifest in &self.manifests {
            if manifest.sub_manifest_number() == 0 {
                self.sub_manifest_sizes
                    .insert(manifest.file_name().to_string(), manifest.catalog().len());
            }
        }

        let mut reconciled = self.reconcile_file_states().await?;
        reconciled.extend(self.segments.iter().map(|s| s.full_name().clone()));
        reconciled.extend(self.manifests.iter().map(|m| m.full_name().clone()));
        info!(
            "Reconciled {} segments, {} manifests, {} bitmaps",
            self.segments.len(),
            self.manifests.len(),
            self.file_states.len()
        );
        Ok(reconciled)
    }

    /// The held torrent segments, a verified chain prefix
    pub fn segments(&self) -> &[TorrentSegment] {
        &self.segments
    }

    /// The held sub-manifests, ordered by file then chain position
    pub fn manifests(&self) -> &[FileManifest] {
        &self.manifests
    }

    /// The bitmap for a held sub-manifest, if any packet is persisted
    pub fn file_state(&self, manifest_full_name: &Name) -> Option<&[bool]> {
        self.file_states.get(manifest_full_name).map(|v| v.as_slice())
    }

    /// The sub-manifest catalog length recorded for a file
    pub fn sub_manifest_size(&self, file_name: &str) -> Option<usize> {
        self.sub_manifest_sizes.get(file_name).copied()
    }

    /// The next torrent segment to request, None when the chain is done
    pub fn next_segment_to_fetch(&self) -> Option<Name> {
        match self.segments.last() {
            None => Some(self.initial_segment_name.clone()),
            Some(segment) => segment.next_segment().cloned(),
        }
    }

    /// Resolve which sub-manifest to request for a manifest name
    ///
    /// None means every sub-manifest up to and past the requested one is
    /// already held.
    pub fn manifest_segment_to_fetch(&self, requested: &Name) -> Option<Name> {
        let prefix = FileManifest::manifest_prefix(requested);
        let held = self
            .manifests
            .iter()
            .rev()
            .find(|m| prefix.is_prefix_of(m.name()));
        let held = match held {
            Some(held) => held,
            None => return Some(requested.clone()),
        };

        let core = requested.without_digest();
        let requested_sub = core
            .len()
            .checked_sub(1)
            .and_then(|i| core.sequence_at(i));
        match requested_sub {
            Some(sub) if held.sub_manifest_number() >= sub => held.next_sub_manifest().cloned(),
            _ => Some(requested.clone()),
        }
    }

    /// The first missing sub-manifest of every file in the torrent
    pub fn manifests_to_fetch(&self) -> Vec<Name> {
        let mut names = Vec::new();
        for segment in &self.segments {
            for initial in segment.catalog() {
                if let Some(name) = self.manifest_segment_to_fetch(initial) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Check whether a data packet is persisted
    pub fn has_packet(&self, data_name: &Name) -> bool {
        let manifest = self
            .manifests
            .iter()
            .find(|m| m.name().is_prefix_of(data_name));
        let manifest = match manifest {
            Some(manifest) => manifest,
            None => return false,
        };
        let state = match self.file_states.get(manifest.full_name()) {
            Some(state) => state,
            None => return false,
        };
        let core = data_name.without_digest();
        match core.len().checked_sub(1).and_then(|i| core.sequence_at(i)) {
            Some(index) => state.get(index as usize).copied().unwrap_or(false),
            None => false,
        }
    }

    /// The missing packet names of the file a manifest name refers to
    pub fn missing_packets(&self, manifest_name: &Name) -> Vec<Name> {
        let start = self.manifests.iter().position(|m| {
            FileManifest::manifest_prefix(m.name()).is_prefix_of(manifest_name)
        });
        let start = match start {
            Some(start) => start,
            None => return Vec::new(),
        };

        let file = self.manifests[start].file_name().to_string();
        let mut names = Vec::new();
        for manifest in &self.manifests[start..] {
            if manifest.file_name() != file {
                break;
            }
            self.collect_missing(manifest, &mut names);
        }
        names
    }

    /// The missing packet names across every held manifest
    pub fn all_missing_packets(&self) -> Vec<Name> {
        let mut names = Vec::new();
        for manifest in &self.manifests {
            self.collect_missing(manifest, &mut names);
        }
        names
    }

    /// Whether the whole segment chain is held, initial to null pointer
    pub fn has_all_torrent_segments(&self) -> bool {
        let mut expected = self.initial_segment_name.clone();
        loop {
            let segment = match self.segments.iter().find(|s| s.full_name() == &expected) {
                Some(segment) => segment,
                None => return false,
            };
            match segment.next_segment() {
                Some(next) => expected = next.clone(),
                None => return true,
            }
        }
    }

    /// Whether every sub-manifest of the named manifest's file is held
    pub fn has_all_manifest_segments(&self, manifest_full_name: &Name) -> bool {
        let manifest = match self.manifest_by_full_name(manifest_full_name) {
            Some(manifest) => manifest,
            None => return false,
        };
        let file = manifest.file_name();
        let mut current = match self
            .manifests
            .iter()
            .find(|m| m.file_name() == file && m.sub_manifest_number() == 0)
        {
            Some(first) => first,
            None => return false,
        };
        loop {
            match current.next_sub_manifest() {
                None => return true,
                Some(next) => {
                    current = match self.manifests.iter().find(|m| m.full_name() == next) {
                        Some(manifest) => manifest,
                        None => return false,
                    };
                }
            }
        }
    }

    /// Find a held segment by full name
    pub fn segment_by_full_name(&self, name: &Name) -> Option<&TorrentSegment> {
        self.segments.iter().find(|s| s.full_name() == name)
    }

    /// Find a held manifest by full name
    pub fn manifest_by_full_name(&self, name: &Name) -> Option<&FileManifest> {
        self.manifests.iter().find(|m| m.full_name() == name)
    }

    /// Persist a torrent segment, splicing it into the chain position
    ///
    /// Returns false when the segment is outside the torrent prefix or
    /// already held.
    pub async fn insert_segment(&mut self, segment: TorrentSegment) -> Result<bool, CoreError> {
        if !self.torrent_file_prefix.is_prefix_of(segment.name()) {
            debug!(
                "Rejecting segment {} outside torrent prefix {}",
                segment.name(),
                self.torrent_file_prefix
            );
            return Ok(false);
        }
        if self.segments.iter().any(|s| s == &segment) {
            return Ok(false);
        }

        codec::write_torrent_segment(&segment, &self.torrent_files_dir).await?;
        let position = self
            .segments
            .iter()
            .position(|s| segment.segment_number() < s.segment_number())
            .unwrap_or(self.segments.len());
        self.segments.insert(position, segment);
        Ok(true)
    }

    /// Persist a sub-manifest, splicing it in (file, chain) order
    ///
    /// Returns false when the manifest is already held.
    pub async fn insert_manifest(&mut self, manifest: FileManifest) -> Result<bool, CoreError> {
        if self.manifests.iter().any(|m| m == &manifest) {
            return Ok(false);
        }
        if manifest.sub_manifest_number() == 0 {
            self.sub_manifest_sizes
                .insert(manifest.file_name().to_string(), manifest.catalog().len());
        }

        codec::write_manifest(&manifest, &self.manifests_dir).await?;
        let position = self
            .manifests
            .iter()
            .position(|m| {
                m.file_name() > manifest.file_name()
                    || (m.file_name() == manifest.file_name()
                        && m.sub_manifest_number() > manifest.sub_manifest_number())
            })
            .unwrap_or(self.manifests.len());
        self.manifests.insert(position, manifest);
        Ok(true)
    }

    /// Persist a data packet at its offset and set its bitmap bit
    ///
    /// Returns false when no held manifest owns the packet or the bit is
    /// already set. Disk failures propagate without setting the bit.
    pub async fn store_packet(&mut self, packet: &DataPacket) -> Result<bool, CoreError> {
        let owner = self
            .manifests
            .iter()
            .filter(|m| m.name().is_prefix_of(packet.name()))
            .max_by_key(|m| m.name().len())
            .cloned();
        let manifest = match owner {
            Some(manifest) => manifest,
            None => {
                warn!("No held manifest owns packet {}", packet.name());
                return Ok(false);
            }
        };

        let index = match packet.packet_index() {
            Some(index) => index as usize,
            None => {
                warn!("Packet name {} has no sequence component", packet.name());
                return Ok(false);
            }
        };
        if index >= manifest.catalog().len() {
            warn!(
                "Packet index {} out of range for manifest {}",
                index,
                manifest.name()
            );
            return Ok(false);
        }

        let file_path = self.data_path.join(manifest.file_name());
        if !self.file_states.contains_key(manifest.full_name()) {
            if let Some(parent) = file_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            self.file_states
                .insert(manifest.full_name().clone(), vec![false; manifest.catalog().len()]);
        }

        let already_held = self
            .file_states
            .get(manifest.full_name())
            .map(|state| state[index])
            .unwrap_or(false);
        if already_held {
            return Ok(false);
        }

        let sub_manifest_size = self
            .sub_manifest_sizes
            .get(manifest.file_name())
            .copied()
            .unwrap_or_else(|| manifest.catalog().len());
        codec::write_packet(packet, &manifest, sub_manifest_size, &file_path).await?;

        if let Some(state) = self.file_states.get_mut(manifest.full_name()) {
            state[index] = true;
        }
        Ok(true)
    }

    /// Read a held packet back from disk to answer an inbound request
    pub async fn read_served_packet(
        &self,
        request: &Name,
    ) -> Result<Option<DataPacket>, CoreError> {
        let core = request.without_digest();
        if core.len() < 2 {
            return Ok(None);
        }
        let manifest = self
            .manifests
            .iter()
            .filter(|m| m.name().is_prefix_of(&core))
            .max_by_key(|m| m.name().len());
        let manifest = match manifest {
            Some(manifest) => manifest,
            None => return Ok(None),
        };

        let state = match self.file_states.get(manifest.full_name()) {
            Some(state) => state,
            None => return Ok(None),
        };
        let index = match core.sequence_at(core.len() - 1) {
            Some(index) => index as usize,
            None => return Ok(None),
        };
        if !state.get(index).copied().unwrap_or(false) {
            return Ok(None);
        }

        let sub_manifest_size = self
            .sub_manifest_sizes
            .get(manifest.file_name())
            .copied()
            .unwrap_or_else(|| manifest.catalog().len());
        let file_path = self.data_path.join(manifest.file_name());
        let packet = codec::read_packet(request, manifest, sub_manifest_size, &file_path).await?;

        // a full-name request must resolve to exactly that content
        if let Some(ref read) = packet {
            if request.is_full() && read.full_name() != request {
                debug!("Held packet content does not match requested name {}", request);
                return Ok(None);
            }
        }
        Ok(packet)
    }

    async fn reconcile_segments(&self) -> Result<Vec<TorrentSegment>, CoreError> {
        let mut loaded: Vec<TorrentSegment> =
            codec::load_directory(&self.torrent_files_dir).await?;
        loaded.sort_by_key(|s| s.segment_number());

        let mut expected = self.initial_segment_name.clone();
        let mut accepted = Vec::new();
        for segment in loaded {
            if !segment.verify() {
                warn!("Dropping segment {} with bad signature", segment.name());
                break;
            }
            if segment.full_name() != &expected {
                debug!(
                    "Segment chain breaks at {}: expected {}",
                    segment.full_name(),
                    expected
                );
                break;
            }
            let next = segment.next_segment().cloned();
            accepted.push(segment);
            match next {
                Some(name) => expected = name,
                None => break,
            }
        }
        Ok(accepted)
    }

    async fn reconcile_manifests(&self) -> Result<Vec<FileManifest>, CoreError> {
        let mut loaded: Vec<FileManifest> = codec::load_directory(&self.manifests_dir).await?;
        loaded.retain(|m| {
            let ok = m.verify();
            if !ok {
                warn!("Dropping manifest {} with bad signature", m.name());
            }
            ok
        });
        if loaded.is_empty() {
            return Ok(loaded);
        }

        // order by catalog position of the owning file, then chain position
        let expected_initials: Vec<Name> = self
            .segments
            .iter()
            .flat_map(|s| s.catalog().iter().cloned())
            .collect();
        let file_rank: HashMap<Name, usize> = expected_initials
            .iter()
            .enumerate()
            .map(|(rank, name)| (FileManifest::manifest_prefix(name), rank))
            .collect();
        loaded.sort_by_key(|m| {
            (
                file_rank
                    .get(&FileManifest::manifest_prefix(m.name()))
                    .copied()
                    .unwrap_or(usize::MAX),
                m.sub_manifest_number(),
            )
        });

        let mut accepted = Vec::new();
        let mut position = 0;
        for initial in &expected_initials {
            if position >= loaded.len() {
                break;
            }
            let current_file = loaded[position].file_name().to_string();
            let mut expected = initial.clone();
            // consume while the chain holds
            while position < loaded.len() && loaded[position].full_name() == &expected {
                let manifest = loaded[position].clone();
                position += 1;
                let next = manifest.next_sub_manifest().cloned();
                accepted.push(manifest);
                match next {
                    Some(name) => expected = name,
                    None => break,
                }
            }
            // skip the unverifiable remainder of this file
            while position < loaded.len() && loaded[position].file_name() == current_file {
                position += 1;
            }
        }
        Ok(accepted)
    }

    async fn reconcile_file_states(&mut self) -> Result<Vec<Name>, CoreError> {
        let mut packet_names = Vec::new();
        for index in 0..self.manifests.len() {
            let manifest = self.manifests[index].clone();
            let file_path = self.data_path.join(manifest.file_name());
            if !file_path.exists() {
                if let Some(parent) = file_path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                continue;
            }

            let sub_manifest_size = self
                .sub_manifest_sizes
                .get(manifest.file_name())
                .copied()
                .unwrap_or_else(|| manifest.catalog().len());
            let packets = codec::packetise_file(
                &file_path,
                manifest.name(),
                manifest.data_packet_size(),
                sub_manifest_size,
                manifest.sub_manifest_number(),
            )
            .await?;
            // keep only packets the catalog actually names
            let packets: Vec<DataPacket> = packets
                .into_iter()
                .filter(|p| manifest.catalog().contains(p.full_name()))
                .collect();
            if packets.is_empty() {
                continue;
            }

            let mut bitmap = vec![false; manifest.catalog().len()];
            let mut matched = packets.iter();
            let mut current = matched.next();
            for (bit, entry) in bitmap.iter_mut().zip(manifest.catalog()) {
                match current {
                    None => break,
                    Some(packet) if packet.full_name() == entry => {
                        *bit = true;
                        current = matched.next();
                    }
                    Some(_) => {}
                }
            }
            self.file_states.insert(manifest.full_name().clone(), bitmap);
            packet_names.extend(packets.iter().map(|p| p.full_name().clone()));
        }
        Ok(packet_names)
    }

    fn collect_missing(&self, manifest: &FileManifest, names: &mut Vec<Name>) {
        match self.file_states.get(manifest.full_name()) {
            None => names.extend(manifest.catalog().iter().cloned()),
            Some(state) => {
                for (index, entry) in manifest.catalog().iter().enumerate() {
                    if !state.get(index).copied().unwrap_or(false) {
                        names.push(entry.clone());
                    }
                }
            }
        }
    }
}
