//! Disk persistence for cache snapshots
//!
//! Provides a `CacheStorage` that writes each cache's payload to its own JSON
//! file so a restarted process can serve the last known data immediately.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A snapshot read back from disk
#[derive(Debug)]
pub struct StoredSnapshot<T> {
    /// The persisted payload
    pub data: T,
    /// When the file was last written, if the filesystem reports it
    pub modified: Option<DateTime<Utc>>,
}

/// Reads and writes cache snapshots in a directory
///
/// Each cache is stored as `<dir>/<name>.json` containing only the payload.
/// The files are a warm-start aid: a missing or corrupt file is never an
/// error, the cache simply starts empty.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
}

impl CacheStorage {
    /// Creates a new CacheStorage with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// The platform cache directory for this application
    pub fn default_dir() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "lcp")?;
        Some(project_dirs.cache_dir().to_path_buf())
    }

    /// Directory where cache files are stored
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the path to the file for the given cache name
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.cache_dir)
    }

    /// Overwrites the file for `name` with the serialized payload
    pub fn save<T: Serialize>(&self, name: &str, data: &T) -> io::Result<()> {
        self.ensure_dir()?;

        let json = serde_json::to_string_pretty(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        fs::write(self.path_for(name), json)
    }

    /// Reads the persisted payload for `name`
    ///
    /// Returns `None` if the file doesn't exist or cannot be parsed. Both cases
    /// are logged, neither is fatal.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Option<StoredSnapshot<T>> {
        let path = self.path_for(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(cache = %name, path = %path.display(), "no persisted snapshot");
                return None;
            }
            Err(e) => {
                tracing::warn!(
                    cache = %name,
                    path = %path.display(),
                    error = %e,
                    "failed to read persisted snapshot"
                );
                return None;
            }
        };

        let data = match serde_json::from_str(&content) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    cache = %name,
                    path = %path.display(),
                    error = %e,
                    "failed to parse persisted snapshot"
                );
                return None;
            }
        };

        let modified = fs::metadata(&path)
            .and_then(|meta| meta.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Some(StoredSnapshot { data, modified })
    }
}
