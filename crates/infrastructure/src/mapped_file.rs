use ferrous_policy_domain::DomainError;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// Read-only private mapping of a whole file, optionally pinned in memory.
///
/// Nothing derived from [`bytes`](Self::bytes) may outlive the map; the
/// borrow checker enforces what the original convention left to discipline.
pub struct MappedFile {
    map: Mmap,
    locked: bool,
}

impl MappedFile {
    /// Map `path` read-only. With `lock`, try to pin the pages; a failed pin
    /// is recorded and logged but the map is still returned.
    pub fn open(path: &Path, lock: bool) -> Result<Self, DomainError> {
        let file = File::open(path)
            .map_err(|e| DomainError::Io(format!("{}: {e}", path.display())))?;
        // SAFETY: the mapping is private and read-only; we never hand out
        // references that outlive `self`.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| DomainError::Io(format!("mmap {}: {e}", path.display())))?;

        let locked = if lock {
            match map.lock() {
                Ok(()) => true,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "mlock failed, continuing unpinned");
                    false
                }
            }
        } else {
            false
        };

        Ok(Self { map, locked })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.map
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        if self.locked {
            let _ = self.map.unlock();
        }
    }
}
