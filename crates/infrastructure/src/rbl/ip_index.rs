//! The compact IPv4 membership index built from rsync-style RBL dumps.

use crate::mapped_file::MappedFile;
use ferrous_policy_domain::parse_ipv4;
use ferrous_policy_domain::DomainError;
use std::path::Path;
use tracing::{info, warn};

const BUCKETS: usize = 1 << 16;

/// A read-only multiset of IPv4 addresses.
///
/// Addresses are bucketed by their high 16 bits: `starts` holds one offset
/// per bucket (plus the end sentinel) into the flat `lows` arena of sorted
/// low halves. Halving the comparator width keeps the hot binary search
/// cheap, and one arena means one optional `mlock`.
///
/// Immutable once built; share freely across in-flight queries.
pub struct IpSet {
    starts: Vec<u32>,
    lows: Vec<u16>,
    locked: bool,
}

impl IpSet {
    /// Build the index from a text dump: one dotted-quad per line, leading
    /// blanks tolerated, anything after the address ignored. A line that does
    /// not parse is skipped; a missing final newline drops the last line with
    /// a warning. Parsed addresses are copied out and the mapping is released
    /// before this returns.
    pub fn build(path: &Path, lock: bool) -> Result<Self, DomainError> {
        let map = MappedFile::open(path, false)?;
        let bytes = map.bytes();

        let mut end = bytes.len();
        while end > 0 && bytes[end - 1] != b'\n' {
            end -= 1;
        }
        if end != bytes.len() {
            warn!(file = %path.display(), "missing final newline, ignoring last line");
        }

        let mut ips: Vec<u32> = Vec::new();
        let mut p = 0;
        while p < end {
            while matches!(bytes[p], b' ' | b'\t' | b'\r') {
                p += 1;
            }
            match parse_ipv4(&bytes[p..end]) {
                Some((ip, rest)) => {
                    ips.push(ip);
                    p = end - rest.len();
                }
                None => match bytes[p..end].iter().position(|&b| b == b'\n') {
                    Some(off) => p += off + 1,
                    None => break,
                },
            }
        }
        drop(map);

        // Sorting the full words groups each bucket contiguously with its
        // low halves already ascending.
        ips.sort_unstable();

        let mut starts = Vec::with_capacity(BUCKETS + 1);
        starts.push(0u32);
        let mut next = 0usize;
        for bucket in 0..BUCKETS {
            while next < ips.len() && (ips[next] >> 16) as usize == bucket {
                next += 1;
            }
            starts.push(next as u32);
        }

        let lows: Vec<u16> = ips.iter().map(|&ip| ip as u16).collect();

        // Lookups may run while the box is swapping; pinning the arena keeps
        // them off the disk.
        let locked = lock && lock_arena(&lows);

        info!(file = %path.display(), ips = lows.len(), "ip list loaded");
        Ok(Self { starts, lows, locked })
    }

    fn bucket(&self, hi: usize) -> &[u16] {
        &self.lows[self.starts[hi] as usize..self.starts[hi + 1] as usize]
    }

    /// Point membership.
    pub fn contains(&self, ip: u32) -> bool {
        self.bucket((ip >> 16) as usize)
            .binary_search(&(ip as u16))
            .is_ok()
    }

    /// Number of addresses loaded, duplicates included.
    pub fn len(&self) -> u32 {
        self.lows.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.lows.is_empty()
    }
}

impl Drop for IpSet {
    fn drop(&mut self) {
        if self.locked && !self.lows.is_empty() {
            // SAFETY: the pointer and length describe the arena allocation,
            // untouched since the matching mlock.
            unsafe {
                libc::munlock(
                    self.lows.as_ptr().cast(),
                    std::mem::size_of_val(self.lows.as_slice()),
                );
            }
        }
    }
}

fn lock_arena(lows: &[u16]) -> bool {
    if lows.is_empty() {
        return false;
    }
    // SAFETY: the pointer and length describe memory owned by `lows` for the
    // duration of the call.
    let rc = unsafe { libc::mlock(lows.as_ptr().cast(), std::mem::size_of_val(lows)) };
    if rc != 0 {
        warn!(
            error = %std::io::Error::last_os_error(),
            "mlock failed, ip list stays pageable"
        );
    }
    rc == 0
}
