//! On-disk file and descriptor codec
//!
//! Frames payload files into fixed-size data packets and back. Packet
//! bytes live at the deterministic offset
//! `(sub_manifest_number * sub_manifest_size + packet_index) * packet_size`
//! inside the payload file, so individual packets can be written and
//! read without touching the rest of the file. Descriptors persist as
//! one file each, named by the hex of their full-name digest.

use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::descriptor::{DataPacket, Descriptor, FileManifest, TorrentSegment};
use crate::error::CoreError;
use crate::name::Name;

/// Frame one sub-manifest's worth of a payload file into data packets
///
/// Produces packets named `<name_prefix>/seq=<index>` for the region the
/// sub-manifest covers. The final packet may be shorter than
/// `packet_size`; a region past the end of the file produces no packets.
pub async fn packetise_file(
    path: &Path,
    name_prefix: &Name,
    packet_size: usize,
    sub_manifest_size: usize,
    sub_manifest_number: u64,
) -> Result<Vec<DataPacket>, CoreError> {
    if packet_size == 0 || sub_manifest_size == 0 {
        return Err(CoreError::storage_error_with_path(
            "packet_size and sub_manifest_size must be nonzero",
            path.display().to_string(),
        ));
    }

    let mut file = fs::File::open(path).await.map_err(|e| {
        CoreError::storage_error_full(
            "Failed to open file for packetising",
            path.display().to_string(),
            e.to_string(),
        )
    })?;
    let file_len = file.metadata().await?.len();

    let region_len = (sub_manifest_size * packet_size) as u64;
    let region_start = sub_manifest_number * region_len;
    if region_start >= file_len {
        trace!("Region {} starts past end of {}", sub_manifest_number, path.display());
        return Ok(Vec::new());
    }

    let to_read = region_len.min(file_len - region_start) as usize;
    file.seek(std::io::SeekFrom::Start(region_start)).await?;
    let mut buffer = vec![0u8; to_read];
    file.read_exact(&mut buffer).await?;

    let mut packets = Vec::with_capacity(to_read / packet_size + 1);
    for (index, chunk) in buffer.chunks(packet_size).enumerate() {
        let name = name_prefix.with_sequence(index as u64);
        packets.push(DataPacket::new(name, chunk.to_vec())?);
    }
    debug!(
        "Packetised {} into {} packets (region {})",
        path.display(),
        packets.len(),
        sub_manifest_number
    );
    Ok(packets)
}

/// Write one data packet at its deterministic offset in the payload file
pub async fn write_packet(
    packet: &DataPacket,
    manifest: &FileManifest,
    sub_manifest_size: usize,
    file_path: &Path,
) -> Result<(), CoreError> {
    let index = packet.packet_index().ok_or_else(|| {
        CoreError::name_error_for("Packet name has no sequence component", packet.name().to_string())
    })?;
    let offset = packet_offset(manifest, sub_manifest_size, index);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .open(file_path)
        .await
        .map_err(|e| {
            CoreError::storage_error_full(
                "Failed to open payload file for writing",
                file_path.display().to_string(),
                e.to_string(),
            )
        })?;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    file.write_all(packet.payload()).await?;
    file.flush().await?;
    trace!("Wrote packet {} at offset {}", packet.name(), offset);
    Ok(())
}

/// Read one data packet back from its deterministic offset
///
/// Returns `None` when the file is missing or the offset lies past its
/// end. The packet is re-signed from the read bytes, so its full name
/// matches the original iff the content does.
pub async fn read_packet(
    name: &Name,
    manifest: &FileManifest,
    sub_manifest_size: usize,
    file_path: &Path,
) -> Result<Option<DataPacket>, CoreError> {
    let core = name.without_digest();
    let index = match core.len().checked_sub(1).and_then(|i| core.sequence_at(i)) {
        Some(index) => index,
        None => {
            debug!("Packet name {} has no sequence component", name);
            return Ok(None);
        }
    };
    let offset = packet_offset(manifest, sub_manifest_size, index);

    let mut file = match fs::File::open(file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CoreError::storage_error_full(
                "Failed to open payload file for reading",
                file_path.display().to_string(),
                e.to_string(),
            ))
        }
    };
    let file_len = file.metadata().await?.len();
    if offset >= file_len {
        return Ok(None);
    }

    let length = (manifest.data_packet_size() as u64).min(file_len - offset) as usize;
    file.seek(std::io::SeekFrom::Start(offset)).await?;
    let mut buffer = vec![0u8; length];
    file.read_exact(&mut buffer).await?;
    Ok(Some(DataPacket::new(core, buffer)?))
}

/// Persist one torrent-file segment into the segment directory
pub async fn write_torrent_segment(
    segment: &TorrentSegment,
    dir: &Path,
) -> Result<(), CoreError> {
    write_descriptor(segment, dir).await
}

/// Persist one sub-manifest into the manifest directory
pub async fn write_manifest(manifest: &FileManifest, dir: &Path) -> Result<(), CoreError> {
    write_descriptor(manifest, dir).await
}

/// Load every decodable descriptor from a directory
///
/// Files that fail to decode are skipped with a warning. Entries are
/// visited in file-name order so repeated loads are deterministic.
pub async fn load_directory<T: Descriptor>(dir: &Path) -> Result<Vec<T>, CoreError> {
    let mut items = Vec::new();
    if !dir.exists() {
        return Ok(items);
    }

    let mut entries = fs::read_dir(dir).await.map_err(|e| {
        CoreError::storage_error_full(
            "Failed to read descriptor directory",
            dir.display().to_string(),
            e.to_string(),
        )
    })?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Skipping unreadable descriptor file {}: {}", path.display(), e);
                continue;
            }
        };
        match T::decode(&bytes) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!("Skipping undecodable descriptor file {}: {}", path.display(), e);
            }
        }
    }
    Ok(items)
}

fn packet_offset(manifest: &FileManifest, sub_manifest_size: usize, index: u64) -> u64 {
    (manifest.sub_manifest_number() * sub_manifest_size as u64 + index)
        * manifest.data_packet_size() as u64
}

async fn write_descriptor<T: Descriptor>(item: &T, dir: &Path) -> Result<(), CoreError> {
    fs::create_dir_all(dir).await.map_err(|e| {
        CoreError::storage_error_full(
            "Failed to create descriptor directory",
            dir.display().to_string(),
            e.to_string(),
        )
    })?;
    let digest = item.full_name().digest().ok_or_else(|| {
        CoreError::name_error_for("Descriptor full name has no digest", item.full_name().to_string())
    })?;
    let path = dir.join(format!("{}.json", hex::encode(digest)));
    let bytes = item.encode()?;
    fs::write(&path, bytes).await.map_err(|e| {
        CoreError::storage_error_full(
            "Failed to write descriptor file",
            path.display().to_string(),
            e.to_string(),
        )
    })?;
    trace!("Wrote descriptor {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ndtorrent_codec_{}_{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manifest_for(file: &str, sub: u64, packet_size: usize, catalog: Vec<Name>) -> FileManifest {
        let name = Name::from_uri("/swarm/demo")
            .unwrap()
            .child(file)
            .with_sequence(sub);
        FileManifest::new(name, file.to_string(), sub, packet_size, catalog, None).unwrap()
    }

    #[tokio::test]
    async fn test_packetise_file_chunks_and_names() {
        let dir = scratch_dir("packetise");
        let path = dir.join("a.bin");
        tokio::fs::write(&path, vec![7u8; 10]).await.unwrap();

        let prefix = Name::from_uri("/swarm/demo/a.bin/seq=0").unwrap();
        let packets = packetise_file(&path, &prefix, 4, 8, 0).await.unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].payload().len(), 4);
        assert_eq!(packets[2].payload().len(), 2);
        assert_eq!(packets[1].name().to_string(), "/swarm/demo/a.bin/seq=0/seq=1");

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_packetise_file_second_region() {
        let dir = scratch_dir("region");
        let path = dir.join("a.bin");
        // two full regions of 2 packets x 4 bytes
        tokio::fs::write(&path, (0u8..16).collect::<Vec<_>>()).await.unwrap();

        let prefix = Name::from_uri("/swarm/demo/a.bin/seq=1").unwrap();
        let packets = packetise_file(&path, &prefix, 4, 2, 1).await.unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].payload(), &[8, 9, 10, 11]);
        assert_eq!(packets[0].packet_index(), Some(0));

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_packetise_file_past_end_is_empty() {
        let dir = scratch_dir("past_end");
        let path = dir.join("a.bin");
        tokio::fs::write(&path, vec![1u8; 4]).await.unwrap();

        let prefix = Name::from_uri("/swarm/demo/a.bin/seq=3").unwrap();
        let packets = packetise_file(&path, &prefix, 4, 2, 3).await.unwrap();
        assert!(packets.is_empty());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_write_read_packet_round_trip() {
        let dir = scratch_dir("round_trip");
        let path = dir.join("payload.bin");

        let manifest = manifest_for("payload.bin", 1, 4, Vec::new());
        let packet_name = manifest.name().with_sequence(2);
        let packet = DataPacket::new(packet_name.clone(), vec![5, 6, 7, 8]).unwrap();

        write_packet(&packet, &manifest, 3, &path).await.unwrap();
        // sub 1, sub_manifest_size 3, index 2 -> offset (3 + 2) * 4 = 20
        assert_eq!(tokio::fs::metadata(&path).await.unwrap().len(), 24);

        let read = read_packet(&packet_name, &manifest, 3, &path).await.unwrap().unwrap();
        assert_eq!(read.payload(), packet.payload());
        assert_eq!(read.full_name(), packet.full_name());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_read_packet_missing_file() {
        let dir = scratch_dir("missing");
        let manifest = manifest_for("gone.bin", 0, 4, Vec::new());
        let name = manifest.name().with_sequence(0);
        let read = read_packet(&name, &manifest, 2, &dir.join("gone.bin")).await.unwrap();
        assert!(read.is_none());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_packetise_round_trip_reassembles_content() {
        let dir = scratch_dir("reassemble");
        let source = dir.join("src.bin");
        let copy = dir.join("copy.bin");
        let content: Vec<u8> = (0u8..50).collect();
        tokio::fs::write(&source, &content).await.unwrap();

        // packetise both regions, write every packet into a fresh file
        for sub in 0u64..2 {
            let manifest = manifest_for("copy.bin", sub, 8, Vec::new());
            let packets = packetise_file(&source, manifest.name(), 8, 4, sub).await.unwrap();
            for packet in &packets {
                write_packet(packet, &manifest, 4, &copy).await.unwrap();
            }
        }
        assert_eq!(tokio::fs::read(&copy).await.unwrap(), content);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_write_and_load_directory() {
        let dir = scratch_dir("load_dir");
        let seg_dir = dir.join("torrent_files");

        let name = Name::from_uri("/swarm/demo/torrent-file/seq=0").unwrap();
        let segment = TorrentSegment::new(name, 0, Vec::new(), None).unwrap();
        write_torrent_segment(&segment, &seg_dir).await.unwrap();
        // second write of the same segment lands on the same file name
        write_torrent_segment(&segment, &seg_dir).await.unwrap();

        let loaded: Vec<TorrentSegment> = load_directory(&seg_dir).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], segment);
        assert!(loaded[0].verify());

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_load_directory_skips_garbage() {
        let dir = scratch_dir("garbage");
        let seg_dir = dir.join("torrent_files");
        tokio::fs::create_dir_all(&seg_dir).await.unwrap();
        tokio::fs::write(seg_dir.join("junk.json"), b"not a descriptor").await.unwrap();

        let name = Name::from_uri("/swarm/demo/torrent-file/seq=0").unwrap();
        let segment = TorrentSegment::new(name, 0, Vec::new(), None).unwrap();
        write_torrent_segment(&segment, &seg_dir).await.unwrap();

        let loaded: Vec<TorrentSegment> = load_directory(&seg_dir).await.unwrap();
        assert_eq!(loaded.len(), 1);

        let _ = tokio::fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_load_directory_missing_dir() {
        let loaded: Vec<TorrentSegment> =
            load_directory(Path::new("/nonexistent/ndtorrent")).await.unwrap();
        assert!(loaded.is_empty());
    }
}
