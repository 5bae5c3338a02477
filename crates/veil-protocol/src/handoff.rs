//! Handoff medium: named locations the two parties exchange bytes through.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Storage for encoded operands, results, context material and descriptors.
///
/// Locations are slash-separated names. Writes overwrite, so re-running a
/// step supersedes the previous run's artifacts.
pub trait HandoffMedium {
    fn read(&self, location: &str) -> io::Result<Vec<u8>>;

    fn write(&self, location: &str, bytes: &[u8]) -> io::Result<()>;

    fn exists(&self, location: &str) -> bool;

    fn read_to_string(&self, location: &str) -> io::Result<String> {
        let bytes = self.read(location)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Shared filesystem medium
#[derive(Debug, Clone, Default)]
pub struct FsHandoff {
    root: Option<PathBuf>,
}

impl FsHandoff {
    /// Locations are paths relative to the working directory
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Locations are paths relative to `root`
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn path_of(&self, location: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(location),
            None => PathBuf::from(location),
        }
    }
}

impl HandoffMedium for FsHandoff {
    fn read(&self, location: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.path_of(location))
    }

    fn write(&self, location: &str, bytes: &[u8]) -> io::Result<()> {
        let path = self.path_of(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }

    fn exists(&self, location: &str) -> bool {
        self.path_of(location).is_file()
    }
}

/// In-process medium for tests and single-process runs
#[derive(Debug, Clone, Default)]
pub struct MemoryHandoff {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove(&self, location: &str) -> Option<Vec<u8>> {
        self.entries.write().remove(location)
    }

    pub fn locations(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl HandoffMedium for MemoryHandoff {
    fn read(&self, location: &str) -> io::Result<Vec<u8>> {
        self.entries.read().get(location).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no data at {location}"))
        })
    }

    fn write(&self, location: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries
            .write()
            .insert(location.to_string(), bytes.to_vec());
        Ok(())
    }

    fn exists(&self, location: &str) -> bool {
        self.entries.read().contains_key(location)
    }
}
