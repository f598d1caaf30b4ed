//! Error taxonomy shared by mount drivers.
//!
//! Three layers, matching where a failure is detected:
//!
//! - [`TransportError`]: the serial exchange itself failed (write error,
//!   read error, or response deadline expired).
//! - [`ProtocolError`]: bytes arrived but do not decode as a valid response.
//! - [`MountError`]: everything a driver surfaces to the host, including the
//!   two above plus mount-level outcomes such as a rejected sync point.
//!
//! There are no automatic retries anywhere in this stack; every failure is
//! surfaced once and the caller decides whether to retry.

use std::time::Duration;
use thiserror::Error;

/// A serial exchange with the device failed.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Writing the command buffer failed or was short.
    #[error("command write failed: {0}")]
    Write(#[source] std::io::Error),

    /// The port returned a hard error while reading the response.
    #[error("response read failed: {0}")]
    Read(#[source] std::io::Error),

    /// No response terminator arrived before the deadline. Any bytes read
    /// before the deadline have been discarded.
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// A response arrived but does not decode.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The response is too short to contain the expected fields.
    #[error("response too short: {len} bytes, need {need}")]
    ShortResponse {
        /// Bytes actually received.
        len: usize,
        /// Minimum bytes the decoder requires.
        need: usize,
    },

    /// The response does not match the expected shape.
    #[error("cannot parse response {response:?}")]
    ParseFailure {
        /// The offending payload, terminator already stripped.
        response: String,
    },
}

impl ProtocolError {
    /// Convenience constructor for [`ProtocolError::ParseFailure`].
    pub fn parse_failure(response: impl Into<String>) -> Self {
        ProtocolError::ParseFailure {
            response: response.into(),
        }
    }
}

/// Driver-level error surfaced to the host framework.
#[derive(Debug, Error)]
pub enum MountError {
    /// Serial exchange failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Undecodable device response.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The observed attitude duplicates a stored sync point; the store was
    /// not mutated.
    #[error("duplicate sync point for the observed attitude")]
    DuplicateSyncPoint,

    /// The device answered but refused the command, or identified itself as
    /// something other than the expected hardware.
    #[error("device refused: {0}")]
    DeviceRefusal(String),
}
