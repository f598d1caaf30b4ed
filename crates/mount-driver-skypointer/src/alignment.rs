//! Alignment sync store.
//!
//! Append-only collection of observations pairing a requested celestial
//! coordinate with the attitude the device was actually pointing at. The
//! store is what the external alignment solver trains its transform on, so
//! it must never hold two entries with equivalent observed attitude;
//! duplicate observations would feed the solver degenerate data.

use mount_core::{MountError, SyncPoint};

/// Two observed direction vectors closer than this (degrees) count as the
/// same attitude. One motor step is 0.1125°, so distinct attitudes can
/// never collide.
pub const DUPLICATE_TOLERANCE_DEG: f64 = 0.1;

/// Append-only sync-point store with duplicate rejection.
#[derive(Debug, Default)]
pub struct SyncStore {
    points: Vec<SyncPoint>,
}

impl SyncStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the store holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The full point set, oldest first.
    pub fn points(&self) -> &[SyncPoint] {
        &self.points
    }

    /// Append a candidate point, returning the new store size.
    ///
    /// Rejected without mutation when an existing point's observed direction
    /// vector falls within [`DUPLICATE_TOLERANCE_DEG`] of the candidate's.
    pub fn try_add(&mut self, candidate: SyncPoint) -> Result<usize, MountError> {
        let duplicate = self.points.iter().any(|point| {
            point
                .direction
                .angular_separation_deg(&candidate.direction)
                < DUPLICATE_TOLERANCE_DEG
        });
        if duplicate {
            return Err(MountError::DuplicateSyncPoint);
        }
        self.points.push(candidate);
        Ok(self.points.len())
    }
}
