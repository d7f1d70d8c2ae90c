//! # Snapshot Store
//!
//! Latest decoded RC channels and link statistics, shared between the
//! background reader (single writer) and any number of readers.
//!
//! Each snapshot is replaced as a whole inside the lock and copied out on
//! read, so a reader never sees a half-written value. Until the first valid
//! frame of a kind arrives, reads return the zero value.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::crsf::protocol::{LinkStatistics, RcChannels, CRSF_NUM_CHANNELS};

/// A snapshot together with the moment it was stored
#[derive(Debug, Clone, Copy)]
struct Stamped<T> {
    value: T,
    received_at: Instant,
}

#[derive(Debug, Default)]
struct Snapshots {
    channels: Option<Stamped<RcChannels>>,
    link: Option<Stamped<LinkStatistics>>,
    counts: SnapshotCounts,
}

/// Number of snapshot replacements per kind
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCounts {
    pub channels: u64,
    pub link: u64,
}

/// Mutex-guarded latest-value store
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: Mutex<Snapshots>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Snapshots> {
        // Writers only assign whole values, so a poisoned lock still holds a consistent snapshot
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the channel snapshot
    pub fn update_channels(&self, channels: RcChannels) {
        let mut inner = self.lock();
        inner.channels = Some(Stamped {
            value: channels,
            received_at: Instant::now(),
        });
        inner.counts.channels += 1;
    }

    /// Replace the link statistics snapshot
    pub fn update_link(&self, link: LinkStatistics) {
        let mut inner = self.lock();
        inner.link = Some(Stamped {
            value: link,
            received_at: Instant::now(),
        });
        inner.counts.link += 1;
    }

    /// Copy of the latest channels, all zero if none received yet
    pub fn channels(&self) -> RcChannels {
        self.lock()
            .channels
            .map(|s| s.value)
            .unwrap_or([0; CRSF_NUM_CHANNELS])
    }

    /// Copy of the latest link statistics, zeroed if none received yet
    pub fn link(&self) -> LinkStatistics {
        self.lock().link.map(|s| s.value).unwrap_or_default()
    }

    pub fn has_channels(&self) -> bool {
        self.lock().channels.is_some()
    }

    pub fn has_link(&self) -> bool {
        self.lock().link.is_some()
    }

    /// Time since the last channel update
    pub fn channels_age(&self) -> Option<Duration> {
        self.lock().channels.map(|s| s.received_at.elapsed())
    }

    /// Time since the last link statistics update
    pub fn link_age(&self) -> Option<Duration> {
        self.lock().link.map(|s| s.received_at.elapsed())
    }

    pub fn counts(&self) -> SnapshotCounts {
        self.lock().counts
    }
}
