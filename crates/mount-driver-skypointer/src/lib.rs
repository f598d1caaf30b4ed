//! SkyPointer mount driver.
//!
//! Drives a motorized alt-azimuth laser pointer over a serial link and
//! presents it to a pointing/alignment host as a virtual telescope mount
//! implementing [`mount_core::MountControl`].
//!
//! Layering, bottom up:
//!
//! - [`protocol`]: pure ASCII codec for the device's CR-terminated wire
//!   protocol, including the calibration-register bit-pattern conversion
//!   and the fixed-offset firmware version decode
//! - [`transport`]: the exclusive serial session (drain, write, read to CR
//!   under a fixed deadline)
//! - [`device`]: typed command set, one exchange per operation
//! - [`motion`]: simulated slew state machine and jog step geometry
//! - [`alignment`]: append-only sync store with duplicate rejection
//! - [`mount`]: the [`SkyPointerMount`] orchestration tying it together
//!
//! ```rust,ignore
//! use mount_core::NoAlignment;
//! use mount_driver_skypointer::{SkyPointerConfig, SkyPointerMount};
//!
//! let config: SkyPointerConfig = toml::from_str(r#"
//!     port = "/dev/ttyUSB0"
//!     laser_timeout_ms = 30000
//! "#)?;
//! let mount = SkyPointerMount::connect(&config, Box::new(NoAlignment)).await?;
//! mount.goto(5.5, 41.2).await?;
//! ```

pub mod alignment;
pub mod device;
pub mod motion;
pub mod mount;
pub mod protocol;
pub mod transport;

#[cfg(test)]
pub(crate) mod testkit;

pub use device::SkyPointer;
pub use mount::{SkyPointerConfig, SkyPointerMount, BAUD_RATE};
pub use protocol::{Calibration, FirmwareVersion, StepPosition};
pub use transport::Transport;
