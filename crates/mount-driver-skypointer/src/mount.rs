//! Mount orchestration: ties the device command set, the slew simulator and
//! the sync store together behind [`mount_core::MountControl`].
//!
//! Everything runs on the host's single control context; the only lock held
//! across I/O is the transport's own port mutex. Mount state lives behind
//! short-lived `parking_lot` mutexes that are never held across an await.

use async_trait::async_trait;
use chrono::Utc;
use mount_core::serial::open_port;
use mount_core::{
    event_channel, AlignmentModel, EquatorialCoords, HorizontalDirection, MotionCommand,
    MountControl, MountError, MountEvent, MountEventReceiver, MountEventSender, SlewRate,
    SyncPoint, TelescopeDirectionVector, TrackState, VerticalDirection,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::alignment::SyncStore;
use crate::device::SkyPointer;
use crate::motion::{jog_steps_ns, jog_steps_we, SlewSimulator};
use crate::protocol::{Calibration, FirmwareVersion, StepPosition};
use crate::transport::Transport;

/// Serial line rate of the SkyPointer firmware.
pub const BAUD_RATE: u32 = 115_200;

/// Capacity of the host notification channel.
const EVENT_CAPACITY: usize = 16;

/// Driver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SkyPointerConfig {
    /// Serial port path (e.g. "/dev/ttyUSB0").
    pub port: String,
    /// Laser auto-shutoff timeout applied at connect, milliseconds.
    #[serde(default)]
    pub laser_timeout_ms: Option<u32>,
}

/// The SkyPointer presented as a virtual telescope mount.
pub struct SkyPointerMount {
    device: SkyPointer,
    firmware: FirmwareVersion,
    sim: Mutex<SlewSimulator>,
    last_tick: Mutex<Option<Instant>>,
    rate: Mutex<SlewRate>,
    store: Mutex<SyncStore>,
    last_attitude: Mutex<StepPosition>,
    calibration: Mutex<Calibration>,
    alignment: Mutex<Box<dyn AlignmentModel>>,
    events: MountEventSender,
}

impl std::fmt::Debug for SkyPointerMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkyPointerMount")
            .field("firmware", &self.firmware)
            .finish_non_exhaustive()
    }
}

impl SkyPointerMount {
    /// Open the configured port and run the connect sequence.
    pub async fn connect(
        config: &SkyPointerConfig,
        alignment: Box<dyn AlignmentModel>,
    ) -> anyhow::Result<Self> {
        let port = open_port(&config.port, BAUD_RATE, "SkyPointer").await?;
        let mount = Self::with_transport(Transport::from_raw(Box::new(port)), config, alignment)
            .await?;
        Ok(mount)
    }

    /// Run the connect sequence over an already-open transport.
    ///
    /// Queries and validates the firmware version, homes the device, applies
    /// the configured laser shutoff timeout and reads the calibration
    /// registers. Transport or protocol failures in the version query or the
    /// homing abort the connect; a failed calibration read only logs and
    /// falls back to defaults.
    pub async fn with_transport(
        transport: Transport,
        config: &SkyPointerConfig,
        alignment: Box<dyn AlignmentModel>,
    ) -> Result<Self, MountError> {
        let device = SkyPointer::new(transport);

        let firmware = device.version().await?;
        if !firmware.is_plausible() {
            return Err(MountError::DeviceRefusal(format!(
                "unexpected identification {firmware}, not a SkyPointer"
            )));
        }
        info!(%firmware, "SkyPointer connected");

        device.home().await?;

        if let Some(millis) = config.laser_timeout_ms {
            device.set_shutoff_timeout(millis).await?;
        }

        let calibration = match device.read_calibration().await {
            Ok(calibration) => calibration,
            Err(error) => {
                warn!(%error, "calibration read failed, using defaults");
                Calibration::default()
            }
        };

        let (events, _) = event_channel(EVENT_CAPACITY);
        let _ = events.send(MountEvent::Firmware(firmware.to_string()));

        Ok(Self {
            device,
            firmware,
            sim: Mutex::new(SlewSimulator::default()),
            last_tick: Mutex::new(None),
            rate: Mutex::new(SlewRate::default()),
            store: Mutex::new(SyncStore::new()),
            last_attitude: Mutex::new(StepPosition::default()),
            calibration: Mutex::new(calibration),
            alignment: Mutex::new(alignment),
            events,
        })
    }

    /// Best-effort shutdown: laser off, motors released. Failures are
    /// logged, never propagated.
    pub async fn disconnect(&self) {
        if let Err(error) = self.device.set_laser(false).await {
            warn!(%error, "laser off failed during disconnect");
        }
        if let Err(error) = self.device.quit().await {
            warn!(%error, "quit failed during disconnect");
        }
    }

    /// Firmware version read at connect.
    pub fn firmware(&self) -> FirmwareVersion {
        self.firmware
    }

    /// Calibration registers as last read from or written to the device.
    pub fn calibration(&self) -> Calibration {
        *self.calibration.lock()
    }

    /// Write the full calibration register file to the device.
    ///
    /// A failure mid-pass leaves the earlier registers applied on the
    /// device (see [`SkyPointer::write_calibration`]); the cached copy is
    /// only updated after a complete pass.
    pub async fn write_calibration(&self, calibration: Calibration) -> Result<(), MountError> {
        self.device.write_calibration(&calibration).await?;
        *self.calibration.lock() = calibration;
        Ok(())
    }

    /// Number of stored sync points.
    pub fn sync_point_count(&self) -> usize {
        self.store.lock().len()
    }

    /// Snapshot of the sync store, oldest point first.
    pub fn sync_points(&self) -> Vec<SyncPoint> {
        self.store.lock().points().to_vec()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(transport: Transport, alignment: Box<dyn AlignmentModel>) -> Self {
        let (events, _) = event_channel(EVENT_CAPACITY);
        Self {
            device: SkyPointer::new(transport),
            firmware: FirmwareVersion {
                major: '1',
                minor: '0',
            },
            sim: Mutex::new(SlewSimulator::default()),
            last_tick: Mutex::new(None),
            rate: Mutex::new(SlewRate::default()),
            store: Mutex::new(SyncStore::new()),
            last_attitude: Mutex::new(StepPosition::default()),
            calibration: Mutex::new(Calibration::default()),
            alignment: Mutex::new(alignment),
            events,
        }
    }
}

#[async_trait]
impl MountControl for SkyPointerMount {
    async fn goto(&self, ra: f64, dec: f64) -> Result<(), MountError> {
        self.sim.lock().start_slew(ra, dec);
        info!(ra, dec, "slewing to target");
        let _ = self.events.send(MountEvent::TrackState(TrackState::Slewing));
        Ok(())
    }

    async fn sync(&self, ra: f64, dec: f64) -> Result<(), MountError> {
        // A failed attitude query falls back to the last value successfully
        // read; sync never aborts on it.
        let attitude = match self.device.position().await {
            Ok(position) => {
                *self.last_attitude.lock() = position;
                position
            }
            Err(error) => {
                let last = *self.last_attitude.lock();
                warn!(%error, ?last, "attitude query failed, syncing with last known attitude");
                last
            }
        };

        let (az_deg, alt_deg) = attitude.to_degrees();
        let candidate = SyncPoint {
            timestamp: Utc::now(),
            ra,
            dec,
            direction: TelescopeDirectionVector::from_alt_az(alt_deg, az_deg),
        };

        let (size, points) = {
            let mut store = self.store.lock();
            let size = store.try_add(candidate)?;
            (size, store.points().to_vec())
        };
        info!(ra, dec, size, "sync point accepted");
        let _ = self.events.send(MountEvent::SyncStoreChanged(size));

        if let Err(error) = self.alignment.lock().recompute(&points) {
            warn!(%error, "alignment model recompute failed");
        }

        // Refresh the reported position immediately so the client sees the
        // new point's effect before the next poll tick.
        let coords = self.sim.lock().position();
        let _ = self.events.send(MountEvent::Position(coords));
        Ok(())
    }

    async fn abort(&self) -> Result<(), MountError> {
        // Stops the motors only. Target, position and track state stay put,
        // so a pending simulated slew keeps interpolating on the next poll.
        self.device.stop().await
    }

    async fn move_ns(
        &self,
        direction: VerticalDirection,
        command: MotionCommand,
    ) -> Result<(), MountError> {
        match command {
            MotionCommand::Start => {
                let rate = *self.rate.lock();
                let steps = jog_steps_ns(direction, rate);
                debug!(?direction, ?rate, steps, "vertical jog");
                self.device.move_steps(0, steps, rate.motor_speed()).await
            }
            MotionCommand::Stop => self.device.stop().await,
        }
    }

    async fn move_we(
        &self,
        direction: HorizontalDirection,
        command: MotionCommand,
    ) -> Result<(), MountError> {
        match command {
            MotionCommand::Start => {
                let rate = *self.rate.lock();
                let steps = jog_steps_we(direction, rate);
                debug!(?direction, ?rate, steps, "horizontal jog");
                self.device.move_steps(steps, 0, rate.motor_speed()).await
            }
            MotionCommand::Stop => self.device.stop().await,
        }
    }

    async fn poll(&self) -> Result<EquatorialCoords, MountError> {
        let now = Instant::now();
        let dt = {
            let mut last = self.last_tick.lock();
            let dt = last.map_or(0.0, |previous| (now - previous).as_secs_f64());
            *last = Some(now);
            dt
        };

        let (coords, completed) = {
            let mut sim = self.sim.lock();
            let completed = sim.tick(dt);
            (sim.position(), completed)
        };

        if completed {
            info!("slew complete, tracking");
            let _ = self
                .events
                .send(MountEvent::TrackState(TrackState::Tracking));
        }
        let _ = self.events.send(MountEvent::Position(coords));
        Ok(coords)
    }

    fn track_state(&self) -> TrackState {
        self.sim.lock().track_state()
    }

    fn slew_rate(&self) -> SlewRate {
        *self.rate.lock()
    }

    fn set_slew_rate(&self, rate: SlewRate) {
        *self.rate.lock() = rate;
    }

    async fn set_laser(&self, on: bool) -> Result<(), MountError> {
        self.device.set_laser(on).await
    }

    fn firmware_version(&self) -> Option<String> {
        Some(self.firmware.to_string())
    }

    async fn update_location(
        &self,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> Result<(), MountError> {
        self.alignment
            .lock()
            .update_location(latitude, longitude, elevation);
        Ok(())
    }

    fn subscribe(&self) -> MountEventReceiver {
        self.events.subscribe()
    }
}
