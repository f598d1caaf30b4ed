//! SkyPointer wire protocol.
//!
//! ASCII command/response over serial. A command is a single letter,
//! space-separated signed decimal arguments, and a carriage-return
//! terminator (`"M 1 -800\r"`). Responses are CR-terminated lines; most
//! commands answer with a short acknowledgement whose content carries no
//! information. Everything in this module is pure encode/decode.
//!
//! | Command | Format | Response |
//! |---|---|---|
//! | Goto | `G <az> <alt>` | ack |
//! | Move | `M <az> <alt> <speed>` | ack |
//! | Stop | `S` | ack |
//! | Home | `H` | ack |
//! | Quit | `Q` | ack |
//! | Laser | `L <0|1>` | ack |
//! | Auto-shutoff timeout | `T <millis>` | ack |
//! | Position | `P` | `P <az> <alt>` |
//! | Version | `I` | opaque string, digits at bytes 12 and 14 |
//! | Read calib register | `R <n>` | `R <8 hex digits>` |
//! | Write calib register | `W <n> <8 hex digits>` | ack |

use std::fmt;

use mount_core::ProtocolError;

/// Full steps per axis revolution.
pub const STEPS_PER_REV: i32 = 3200;

/// Number of calibration registers in device flash.
pub const N_CALIB_REGS: usize = 3;

/// Longest well-formed response payload, terminator included. Anything
/// longer is a protocol violation.
pub const MAX_RESPONSE_LEN: usize = 16;

/// Response line terminator.
pub const TERMINATOR: u8 = b'\r';

/// Byte offset of the major version digit in the `I` response.
const VERSION_MAJOR_OFFSET: usize = 12;

/// Byte offset of the minor version digit in the `I` response.
const VERSION_MINOR_OFFSET: usize = 14;

//==============================================================================
// Command builders
//==============================================================================

/// `G`: slew both axes to absolute step positions.
pub fn goto_cmd(az: i32, alt: i32) -> String {
    format!("G {az} {alt}\r")
}

/// `M`: move both axes by relative step counts at a motor speed.
pub fn move_cmd(az: i32, alt: i32, speed: u8) -> String {
    format!("M {az} {alt} {speed}\r")
}

/// `S`: halt the motors.
pub fn stop_cmd() -> &'static str {
    "S\r"
}

/// `H`: seek the mechanical home position.
pub fn home_cmd() -> &'static str {
    "H\r"
}

/// `Q`: release the motors and end the session.
pub fn quit_cmd() -> &'static str {
    "Q\r"
}

/// `L`: laser on/off.
pub fn laser_cmd(on: bool) -> String {
    format!("L {}\r", u8::from(on))
}

/// `T`: laser auto-shutoff timeout in milliseconds.
pub fn shutoff_timeout_cmd(millis: u32) -> String {
    format!("T {millis}\r")
}

/// `P`: query the current step position.
pub fn position_cmd() -> &'static str {
    "P\r"
}

/// `I`: query the identification/version string.
pub fn version_cmd() -> &'static str {
    "I\r"
}

/// `R`: read one calibration register.
pub fn get_calib_cmd(index: usize) -> String {
    format!("R {index}\r")
}

/// `W`: write one calibration register as a raw bit pattern.
pub fn set_calib_cmd(index: usize, value: f32) -> String {
    format!("W {index} {}\r", encode_calib(value))
}

//==============================================================================
// Step positions
//==============================================================================

/// Integer step counts on each axis, read fresh on every position query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepPosition {
    /// Azimuth axis steps.
    pub az: i32,
    /// Altitude axis steps.
    pub alt: i32,
}

impl StepPosition {
    /// Convert to `(az, alt)` degrees.
    pub fn to_degrees(self) -> (f64, f64) {
        (
            360.0 * f64::from(self.az) / f64::from(STEPS_PER_REV),
            360.0 * f64::from(self.alt) / f64::from(STEPS_PER_REV),
        )
    }
}

/// Parse a `P <az> <alt>` position response.
pub fn parse_position(payload: &str) -> Result<StepPosition, ProtocolError> {
    let mut fields = payload.split_whitespace();
    match (fields.next(), fields.next(), fields.next(), fields.next()) {
        (Some("P"), Some(az), Some(alt), None) => {
            let az = az
                .parse()
                .map_err(|_| ProtocolError::parse_failure(payload))?;
            let alt = alt
                .parse()
                .map_err(|_| ProtocolError::parse_failure(payload))?;
            Ok(StepPosition { az, alt })
        }
        _ => Err(ProtocolError::parse_failure(payload)),
    }
}

//==============================================================================
// Firmware version
//==============================================================================

/// Two-digit firmware version extracted from the `I` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version digit.
    pub major: char,
    /// Minor version digit.
    pub minor: char,
}

impl FirmwareVersion {
    /// Whether both extracted bytes are plausible version digits. A `false`
    /// here on connect means some other device is answering on the port.
    pub fn is_plausible(self) -> bool {
        self.major.is_ascii_digit() && self.minor.is_ascii_digit()
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Extract the firmware version from the `I` response payload.
///
/// The contract is offset-exact: the byte at index 12 is the major digit and
/// the byte at index 14 the minor digit. A payload too short for those
/// offsets is a [`ProtocolError::ShortResponse`], never a silent wrong
/// answer.
pub fn decode_version(payload: &str) -> Result<FirmwareVersion, ProtocolError> {
    let bytes = payload.as_bytes();
    if bytes.len() <= VERSION_MINOR_OFFSET {
        return Err(ProtocolError::ShortResponse {
            len: bytes.len(),
            need: VERSION_MINOR_OFFSET + 1,
        });
    }
    Ok(FirmwareVersion {
        major: bytes[VERSION_MAJOR_OFFSET] as char,
        minor: bytes[VERSION_MINOR_OFFSET] as char,
    })
}

//==============================================================================
// Calibration registers
//==============================================================================

/// The device's calibration register file.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Calibration(pub [f32; N_CALIB_REGS]);

/// Encode a register value as its raw IEEE-754 bit pattern, 8 zero-padded
/// hex digits. The value is never routed through decimal, so NaN payloads,
/// signed zero and subnormals survive exactly.
pub fn encode_calib(value: f32) -> String {
    format!("{:08x}", value.to_bits())
}

/// Decode a hex bit pattern back into a register value. Exact inverse of
/// [`encode_calib`] for every representable pattern.
pub fn decode_calib(hex: &str) -> Result<f32, ProtocolError> {
    let bits =
        u32::from_str_radix(hex.trim(), 16).map_err(|_| ProtocolError::parse_failure(hex))?;
    Ok(f32::from_bits(bits))
}

/// Parse an `R <8 hex digits>` calibration register response.
pub fn parse_calib_reg(payload: &str) -> Result<f32, ProtocolError> {
    let mut fields = payload.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some("R"), Some(hex), None) => decode_calib(hex),
        _ => Err(ProtocolError::parse_failure(payload)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_framing() {
        assert_eq!(goto_cmd(1200, -450), "G 1200 -450\r");
        assert_eq!(move_cmd(-3200, 800, 4), "M -3200 800 4\r");
        assert_eq!(stop_cmd(), "S\r");
        assert_eq!(laser_cmd(true), "L 1\r");
        assert_eq!(laser_cmd(false), "L 0\r");
        assert_eq!(shutoff_timeout_cmd(30000), "T 30000\r");
        assert_eq!(get_calib_cmd(2), "R 2\r");
    }

    #[test]
    fn position_parses_signed_steps() {
        let pos = parse_position("P 1600 -800").unwrap();
        assert_eq!(pos, StepPosition { az: 1600, alt: -800 });

        let (az_deg, alt_deg) = pos.to_degrees();
        assert!((az_deg - 180.0).abs() < 1e-12);
        assert!((alt_deg + 90.0).abs() < 1e-12);
    }

    #[test]
    fn position_rejects_malformed_payloads() {
        for bad in ["", "P", "P 12", "P 12 34 56", "Q 12 34", "P twelve 34"] {
            assert!(parse_position(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn version_extracts_fixed_offsets() {
        // "SkyPointer v" is exactly 12 bytes, placing the digits at 12 and 14.
        let version = decode_version("SkyPointer v3.1").unwrap();
        assert_eq!(version.to_string(), "3.1");
        assert!(version.is_plausible());
    }

    #[test]
    fn version_rejects_short_payloads() {
        let err = decode_version("SkyPointer").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortResponse { len: 10, need: 15 }
        ));
    }

    #[test]
    fn version_flags_foreign_devices() {
        let version = decode_version("ESP300 ready xx").unwrap();
        assert!(!version.is_plausible());
    }

    #[test]
    fn calib_roundtrip_is_bit_exact() {
        let patterns = [
            0x0000_0000u32, // +0.0
            0x8000_0000,    // -0.0
            0x3f80_0000,    // 1.0
            0xbfc0_0000,    // -1.5
            0x0000_0001,    // smallest subnormal
            0x007f_ffff,    // largest subnormal
            0x7f80_0000,    // +inf
            0xff80_0000,    // -inf
            0x7fc0_dead,    // NaN with payload
            0xffff_ffff,    // NaN, all bits set
        ];
        for bits in patterns {
            let value = f32::from_bits(bits);
            let encoded = encode_calib(value);
            assert_eq!(encoded.len(), 8);
            assert_eq!(decode_calib(&encoded).unwrap().to_bits(), bits);
        }
    }

    #[test]
    fn calib_register_response_framing() {
        let value = parse_calib_reg("R 3f800000").unwrap();
        assert_eq!(value.to_bits(), 0x3f80_0000);

        assert!(parse_calib_reg("R").is_err());
        assert!(parse_calib_reg("R zzzzzzzz").is_err());
        assert!(parse_calib_reg("W 3f800000").is_err());
    }

    #[test]
    fn calib_write_command_carries_bit_pattern() {
        assert_eq!(set_calib_cmd(0, 1.0), "W 0 3f800000\r");
        assert_eq!(set_calib_cmd(2, f32::from_bits(0xdead_beef)), "W 2 deadbeef\r");
    }
}
