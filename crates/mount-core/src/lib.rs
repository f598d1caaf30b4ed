//! `mount-core`
//!
//! Core trait definitions and types for telescope mount drivers.
//!
//! This crate is the boundary between a pointing/alignment host framework and
//! a concrete mount driver. The host holds a [`MountControl`] trait object and
//! never a concrete driver type; drivers implement the trait and report back
//! over a broadcast [`MountEvent`] channel.
//!
//! ## Key pieces
//!
//! - [`MountControl`]: the capability interface a driver implements
//! - [`AlignmentModel`]: the interface to an external alignment-math solver
//! - [`MountEvent`]: driver-to-host notifications (position, state, sync store)
//! - [`error`]: the shared transport/protocol/mount error taxonomy
//! - [`serial`]: async serial-port abstractions (behind the `serial` feature)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub mod error;
#[cfg(feature = "serial")]
pub mod serial;

pub use error::{MountError, ProtocolError, TransportError};

//==============================================================================
// Mount state & motion types
//==============================================================================

/// Tracking state of the mount as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    /// No slew target, motors at rest.
    Idle,
    /// Interpolating toward a goto target.
    Slewing,
    /// Target reached, holding position.
    Tracking,
}

/// Slew-rate selector for manual jogging, coarsest last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlewRate {
    /// Finest rate; jog step counts are halved at this rate.
    Guide,
    /// Centering rate.
    Centering,
    /// Find rate.
    Find,
    /// Full speed.
    Max,
}

impl SlewRate {
    /// Motor speed code sent with move commands at this rate.
    pub fn motor_speed(self) -> u8 {
        match self {
            SlewRate::Guide => 1,
            SlewRate::Centering => 2,
            SlewRate::Find => 4,
            SlewRate::Max => 8,
        }
    }
}

impl Default for SlewRate {
    fn default() -> Self {
        SlewRate::Max
    }
}

/// Jog direction on the vertical (declination-style) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalDirection {
    /// Altitude increasing.
    North,
    /// Altitude decreasing.
    South,
}

/// Jog direction on the horizontal (azimuth) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalDirection {
    /// Azimuth decreasing.
    West,
    /// Azimuth increasing.
    East,
}

/// Start or stop a manual jog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionCommand {
    /// Begin moving in the given direction at the selected slew rate.
    Start,
    /// Halt the motors.
    Stop,
}

/// Equatorial coordinates as reported to the host.
///
/// Right ascension is in hours, declination in degrees, matching the
/// client-facing convention.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialCoords {
    /// Right ascension, hours.
    pub ra: f64,
    /// Declination, degrees.
    pub dec: f64,
}

//==============================================================================
// Alignment types
//==============================================================================

/// Unit vector representation of a horizontal-coordinate observation.
///
/// Built from the mount's observed attitude and handed to the alignment
/// solver; also used for the sync store's duplicate test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelescopeDirectionVector {
    /// North component.
    pub x: f64,
    /// East component.
    pub y: f64,
    /// Zenith component.
    pub z: f64,
}

impl TelescopeDirectionVector {
    /// Build the unit vector for a horizontal observation, angles in degrees.
    pub fn from_alt_az(alt_deg: f64, az_deg: f64) -> Self {
        let alt = alt_deg.to_radians();
        let az = az_deg.to_radians();
        Self {
            x: alt.cos() * az.cos(),
            y: alt.cos() * az.sin(),
            z: alt.sin(),
        }
    }

    /// Angular separation to another direction vector, in degrees.
    pub fn angular_separation_deg(&self, other: &Self) -> f64 {
        let dot = self.x * other.x + self.y * other.y + self.z * other.z;
        // Clamp against rounding drift before acos.
        dot.clamp(-1.0, 1.0).acos().to_degrees()
    }
}

/// One alignment observation: a requested celestial coordinate paired with
/// the attitude the device was actually pointing at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPoint {
    /// When the observation was taken.
    pub timestamp: DateTime<Utc>,
    /// Requested right ascension, hours.
    pub ra: f64,
    /// Requested declination, degrees.
    pub dec: f64,
    /// Observed device attitude as a direction vector.
    pub direction: TelescopeDirectionVector,
}

/// Interface to the external alignment-math plugin.
///
/// The driver never does the horizontal-to-equatorial correction itself; it
/// feeds observations to an implementation of this trait and lets the solver
/// own the transform.
pub trait AlignmentModel: Send {
    /// Recompute the transform from the full sync-point set.
    fn recompute(&mut self, points: &[SyncPoint]) -> anyhow::Result<()>;

    /// Observer location pass-through (degrees, degrees, meters).
    fn update_location(&mut self, latitude: f64, longitude: f64, elevation: f64);
}

/// No-op alignment model, for tests and for running without a solver.
#[derive(Debug, Default)]
pub struct NoAlignment;

impl AlignmentModel for NoAlignment {
    fn recompute(&mut self, _points: &[SyncPoint]) -> anyhow::Result<()> {
        Ok(())
    }

    fn update_location(&mut self, _latitude: f64, _longitude: f64, _elevation: f64) {}
}

//==============================================================================
// Events
//==============================================================================

/// Driver-to-host notifications, fanned out over a broadcast channel.
#[derive(Debug, Clone)]
pub enum MountEvent {
    /// Reported equatorial position changed.
    Position(EquatorialCoords),
    /// Tracking state changed.
    TrackState(TrackState),
    /// The sync store grew to the given size.
    SyncStoreChanged(usize),
    /// Firmware version string, emitted once on connect.
    Firmware(String),
}

/// Sender half of the mount event channel.
pub type MountEventSender = broadcast::Sender<MountEvent>;

/// Receiver half of the mount event channel.
pub type MountEventReceiver = broadcast::Receiver<MountEvent>;

/// Create a mount event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (MountEventSender, MountEventReceiver) {
    broadcast::channel(capacity)
}

//==============================================================================
// Capability interface
//==============================================================================

/// Capability interface a mount driver implements for the host framework.
///
/// All methods are driven from the host's single control context: command
/// callbacks plus a periodic [`poll`](MountControl::poll). Nothing here is
/// designed for concurrent calls against the same device session.
#[async_trait]
pub trait MountControl: Send + Sync {
    /// Slew to the given equatorial target (RA hours, DEC degrees).
    ///
    /// Always overrides any slew already in progress.
    async fn goto(&self, ra: f64, dec: f64) -> Result<(), MountError>;

    /// Record an alignment observation for the given coordinates.
    ///
    /// Rejected with [`MountError::DuplicateSyncPoint`] when the observed
    /// attitude duplicates a stored point.
    async fn sync(&self, ra: f64, dec: f64) -> Result<(), MountError>;

    /// Stop the device motors. Does not clear a pending slew target.
    async fn abort(&self) -> Result<(), MountError>;

    /// Manual jog on the vertical axis.
    async fn move_ns(
        &self,
        direction: VerticalDirection,
        command: MotionCommand,
    ) -> Result<(), MountError>;

    /// Manual jog on the horizontal axis.
    async fn move_we(
        &self,
        direction: HorizontalDirection,
        command: MotionCommand,
    ) -> Result<(), MountError>;

    /// Periodic status poll; advances simulated motion and reports position.
    async fn poll(&self) -> Result<EquatorialCoords, MountError>;

    /// Current tracking state.
    fn track_state(&self) -> TrackState;

    /// Currently selected jog rate.
    fn slew_rate(&self) -> SlewRate;

    /// Select the jog rate used by subsequent move commands.
    fn set_slew_rate(&self, rate: SlewRate);

    /// Switch the laser on or off.
    async fn set_laser(&self, on: bool) -> Result<(), MountError>;

    /// Firmware version reported by the device, if known.
    fn firmware_version(&self) -> Option<String>;

    /// Observer location pass-through to the alignment model.
    async fn update_location(
        &self,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> Result<(), MountError>;

    /// Subscribe to driver notifications.
    fn subscribe(&self) -> MountEventReceiver;
}
