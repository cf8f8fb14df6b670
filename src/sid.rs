//! Storage ids and their allocation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The storage id (sid) identifies a device across device graphs.
///
/// The sid is preserved when a device graph is copied, so the same logical
/// device can be located in both the probed and the staging graph even when
/// its device name changed in between, e.g. for renumbered logical partitions
/// or renamed logical volumes. Some devices do not even have an intrinsic
/// device name, e.g. a btrfs filesystem, which makes the sid the only reliable
/// handle on them.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Sid(pub u64);

impl fmt::Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hands out sids that are unique within one session.
///
/// The allocator is owned by the session and threaded through every
/// device-creating call. The whole library is single-threaded by documented
/// precondition, so a plain counter suffices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidAllocator {
    next: u64,
}

impl SidAllocator {
    /// The first sid ever handed out.
    pub const FIRST_SID: u64 = 42;

    pub fn new() -> Self {
        Self {
            next: Self::FIRST_SID,
        }
    }

    /// Returns the next free sid and advances the counter.
    pub fn next_sid(&mut self) -> Sid {
        let sid = Sid(self.next);
        self.next += 1;
        sid
    }

    /// Marks a sid as taken, e.g. when loading a persisted device graph, so
    /// that later allocations stay unique.
    pub fn reserve(&mut self, sid: Sid) {
        if sid.0 >= self.next {
            self.next = sid.0 + 1;
        }
    }
}

impl Default for SidAllocator {
    fn default() -> Self {
        Self::new()
    }
}
