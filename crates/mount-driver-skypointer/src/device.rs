//! Typed SkyPointer command set.
//!
//! Thin wrappers over [`Transport::execute`], one exchange per operation.
//! Fire-and-forget commands still read the device's acknowledgement line so
//! the line stays in sync; the content is ignored except for an explicit
//! `NK`, which the firmware sends when it refuses a command.

use mount_core::{MountError, ProtocolError};
use tracing::instrument;

use crate::protocol::{
    self, Calibration, FirmwareVersion, StepPosition, MAX_RESPONSE_LEN, N_CALIB_REGS,
};
use crate::transport::Transport;

/// Handle on a connected SkyPointer device.
pub struct SkyPointer {
    transport: Transport,
}

impl SkyPointer {
    /// Wrap a transport session.
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// One exchange returning the response payload, with the protocol's
    /// response length cap enforced.
    async fn query(&self, cmd: &str) -> Result<String, MountError> {
        let response = self.transport.execute(cmd).await?;
        if response.len() >= MAX_RESPONSE_LEN {
            return Err(ProtocolError::parse_failure(response).into());
        }
        Ok(response)
    }

    /// One exchange where the response carries no data, only a possible
    /// refusal.
    async fn command(&self, cmd: &str) -> Result<(), MountError> {
        let response = self.query(cmd).await?;
        if response.trim() == "NK" {
            return Err(MountError::DeviceRefusal(format!(
                "command {:?} rejected",
                cmd.trim_end_matches('\r')
            )));
        }
        Ok(())
    }

    /// Slew both axes to absolute step positions.
    #[instrument(skip(self), err)]
    pub async fn goto_steps(&self, az: i32, alt: i32) -> Result<(), MountError> {
        self.command(&protocol::goto_cmd(az, alt)).await
    }

    /// Move both axes by relative step counts at the given motor speed.
    #[instrument(skip(self), err)]
    pub async fn move_steps(&self, az: i32, alt: i32, speed: u8) -> Result<(), MountError> {
        self.command(&protocol::move_cmd(az, alt, speed)).await
    }

    /// Halt the motors.
    #[instrument(skip(self), err)]
    pub async fn stop(&self) -> Result<(), MountError> {
        self.command(protocol::stop_cmd()).await
    }

    /// Seek the mechanical home position.
    #[instrument(skip(self), err)]
    pub async fn home(&self) -> Result<(), MountError> {
        self.command(protocol::home_cmd()).await
    }

    /// Release the motors and end the session.
    #[instrument(skip(self), err)]
    pub async fn quit(&self) -> Result<(), MountError> {
        self.command(protocol::quit_cmd()).await
    }

    /// Switch the laser on or off.
    #[instrument(skip(self), err)]
    pub async fn set_laser(&self, on: bool) -> Result<(), MountError> {
        self.command(&protocol::laser_cmd(on)).await
    }

    /// Set the laser auto-shutoff timeout.
    #[instrument(skip(self), err)]
    pub async fn set_shutoff_timeout(&self, millis: u32) -> Result<(), MountError> {
        self.command(&protocol::shutoff_timeout_cmd(millis)).await
    }

    /// Query the current step position of both axes.
    #[instrument(skip(self), err)]
    pub async fn position(&self) -> Result<StepPosition, MountError> {
        let response = self.query(protocol::position_cmd()).await?;
        Ok(protocol::parse_position(&response)?)
    }

    /// Query the firmware version.
    #[instrument(skip(self), err)]
    pub async fn version(&self) -> Result<FirmwareVersion, MountError> {
        let response = self.query(protocol::version_cmd()).await?;
        Ok(protocol::decode_version(&response)?)
    }

    /// Read one calibration register as its float value.
    #[instrument(skip(self), err)]
    pub async fn get_calib_reg(&self, index: usize) -> Result<f32, MountError> {
        let response = self.query(&protocol::get_calib_cmd(index)).await?;
        Ok(protocol::parse_calib_reg(&response)?)
    }

    /// Write one calibration register as a raw bit pattern.
    #[instrument(skip(self), err)]
    pub async fn set_calib_reg(&self, index: usize, value: f32) -> Result<(), MountError> {
        self.command(&protocol::set_calib_cmd(index, value)).await
    }

    /// Read all calibration registers in index order, stopping at the first
    /// failure.
    pub async fn read_calibration(&self) -> Result<Calibration, MountError> {
        let mut calibration = Calibration::default();
        for index in 0..N_CALIB_REGS {
            calibration.0[index] = self.get_calib_reg(index).await?;
        }
        Ok(calibration)
    }

    /// Write all calibration registers in index order.
    ///
    /// The first failing register stops the pass and earlier registers stay
    /// applied; there is no rollback. Callers treat a partial write as
    /// requiring a full recalibration retry.
    pub async fn write_calibration(&self, calibration: &Calibration) -> Result<(), MountError> {
        for (index, value) in calibration.0.iter().enumerate() {
            self.set_calib_reg(index, *value).await?;
        }
        Ok(())
    }
}
