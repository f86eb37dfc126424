//! Core configuration
//!
//! Holds the initial torrent-file segment name, disk layout roots, and
//! the tuning constants of the scheduler.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::name::{Component, Name, TORRENT_FILE_KEYWORD};

/// Default in-flight request cap
pub const DEFAULT_WINDOW_SIZE: usize = 5;
/// Default consecutive failures before peer failover
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default number of requests between stats re-sorts
pub const DEFAULT_SORTING_INTERVAL: u32 = 100;
/// Request lifetime handed to the transport
pub const DEFAULT_REQUEST_LIFETIME: Duration = Duration::from_millis(2000);

/// Configuration for the torrent manager
#[derive(Debug, Clone)]
pub struct Config {
    /// Full name of the initial torrent-file segment
    pub initial_segment_name: Name,
    /// Directory reconstructed payload files are written under
    pub data_path: PathBuf,
    /// Root of the per-torrent application state directories
    pub appdata_path: PathBuf,
    /// Keep serving after the download completes
    pub seed: bool,
    /// In-flight request cap
    pub window_size: usize,
    /// Consecutive failures before the peer cursor advances
    pub max_retries: u32,
    /// Requests between stats-table re-sorts
    pub sorting_interval: u32,
    /// Request lifetime handed to the transport
    pub request_lifetime: Duration,
}

impl Config {
    /// Create a configuration with default tuning constants
    pub fn new(initial_segment_name: Name, data_path: PathBuf) -> Self {
        Self {
            initial_segment_name,
            data_path,
            appdata_path: PathBuf::from(".appdata"),
            seed: true,
            window_size: DEFAULT_WINDOW_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            sorting_interval: DEFAULT_SORTING_INTERVAL,
            request_lifetime: DEFAULT_REQUEST_LIFETIME,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.initial_segment_name.is_empty() {
            return Err(anyhow::anyhow!("initial_segment_name cannot be empty"));
        }
        if self.torrent_name().is_none() {
            return Err(anyhow::anyhow!(
                "initial_segment_name must contain a torrent name followed by '{}'",
                TORRENT_FILE_KEYWORD
            ));
        }
        if self.window_size == 0 {
            return Err(anyhow::anyhow!("window_size must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(anyhow::anyhow!("max_retries must be at least 1"));
        }
        if self.sorting_interval == 0 {
            return Err(anyhow::anyhow!("sorting_interval must be at least 1"));
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("data_path cannot be empty"));
        }
        Ok(())
    }

    /// The torrent name: the component before the torrent-file keyword
    pub fn torrent_name(&self) -> Option<&str> {
        let keyword_index = self.keyword_index()?;
        if keyword_index == 0 {
            return None;
        }
        self.initial_segment_name
            .get(keyword_index - 1)
            .and_then(Component::as_str)
    }

    /// The prefix every torrent-file segment name lives under
    pub fn torrent_file_prefix(&self) -> Name {
        match self.keyword_index() {
            Some(i) => self.initial_segment_name.prefix(i + 1),
            None => self.initial_segment_name.without_digest(),
        }
    }

    /// Per-torrent application state directory
    pub fn appdata_dir(&self) -> PathBuf {
        self.appdata_path
            .join(self.torrent_name().unwrap_or("unknown"))
    }

    /// Directory holding persisted torrent-file segments
    pub fn torrent_files_dir(&self) -> PathBuf {
        self.appdata_dir().join("torrent_files")
    }

    /// Directory holding persisted sub-manifests
    pub fn manifests_dir(&self) -> PathBuf {
        self.appdata_dir().join("manifests")
    }

    fn keyword_index(&self) -> Option<usize> {
        self.initial_segment_name
            .components()
            .position(|c| c.as_str() == Some(TORRENT_FILE_KEYWORD))
    }
}
