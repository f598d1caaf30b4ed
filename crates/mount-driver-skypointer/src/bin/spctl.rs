//! `spctl`: bench tool for exercising a SkyPointer over its serial port.
//!
//! Talks straight to the device command set, bypassing the mount layer, so
//! each subcommand maps to one wire exchange. Useful for bring-up and for
//! checking a unit before handing it to the host framework.
//!
//! ```text
//! spctl --port /dev/ttyUSB0 version
//! spctl --port /dev/ttyUSB0 jog -- -800 0
//! RUST_LOG=debug spctl --port /dev/ttyUSB0 calib get
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mount_core::serial::open_port;
use mount_driver_skypointer::protocol::{encode_calib, N_CALIB_REGS};
use mount_driver_skypointer::{SkyPointer, Transport, BAUD_RATE};

#[derive(Parser)]
#[command(name = "spctl", about = "SkyPointer bench control", version)]
struct Cli {
    /// Serial port the device is attached to.
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List serial ports on this machine.
    Ports,
    /// Query the firmware version.
    Version,
    /// Query the current step position.
    Position,
    /// Seek the mechanical home position.
    Home,
    /// Slew to absolute step positions.
    Goto {
        /// Azimuth axis target, steps.
        az: i32,
        /// Altitude axis target, steps.
        alt: i32,
    },
    /// Move by relative step counts.
    Jog {
        /// Azimuth axis steps (signed).
        az: i32,
        /// Altitude axis steps (signed).
        alt: i32,
        /// Motor speed code.
        #[arg(long, default_value_t = 8)]
        speed: u8,
    },
    /// Halt the motors.
    Stop,
    /// Switch the laser.
    Laser {
        /// Desired laser state.
        state: SwitchState,
    },
    /// Read or write the calibration registers.
    Calib {
        #[command(subcommand)]
        op: CalibOp,
    },
    /// Release the motors and end the session.
    Quit,
}

#[derive(Clone, Copy, ValueEnum)]
enum SwitchState {
    On,
    Off,
}

#[derive(Subcommand)]
enum CalibOp {
    /// Dump all registers.
    Get,
    /// Write one register.
    Set {
        /// Register index.
        index: usize,
        /// Register value.
        value: f32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Ports) {
        for info in serialport::available_ports().context("cannot enumerate serial ports")? {
            println!("{}", info.port_name);
        }
        return Ok(());
    }

    let port = open_port(&cli.port, BAUD_RATE, "SkyPointer").await?;
    let device = SkyPointer::new(Transport::from_raw(Box::new(port)));

    match cli.command {
        // Already handled before the port was opened.
        Command::Ports => {}
        Command::Version => {
            println!("firmware {}", device.version().await?);
        }
        Command::Position => {
            let pos = device.position().await?;
            let (az_deg, alt_deg) = pos.to_degrees();
            println!("az {} steps ({az_deg:.3}°)  alt {} steps ({alt_deg:.3}°)", pos.az, pos.alt);
        }
        Command::Home => device.home().await?,
        Command::Goto { az, alt } => device.goto_steps(az, alt).await?,
        Command::Jog { az, alt, speed } => device.move_steps(az, alt, speed).await?,
        Command::Stop => device.stop().await?,
        Command::Laser { state } => {
            device.set_laser(matches!(state, SwitchState::On)).await?;
        }
        Command::Calib { op } => match op {
            CalibOp::Get => {
                let calibration = device.read_calibration().await?;
                for (index, value) in calibration.0.iter().enumerate() {
                    println!("z{index} = {value} (0x{})", encode_calib(*value));
                }
            }
            CalibOp::Set { index, value } => {
                anyhow::ensure!(index < N_CALIB_REGS, "register index out of range");
                device.set_calib_reg(index, value).await?;
            }
        },
        Command::Quit => device.quit().await?,
    }

    Ok(())
}
