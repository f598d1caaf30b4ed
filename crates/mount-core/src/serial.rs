//! Async serial-port abstractions for driver crates.
//!
//! Requires the `serial` cargo feature:
//!
//! ```toml
//! [dependencies]
//! mount-core = { path = "../mount-core", features = ["serial"] }
//! ```
//!
//! A driver owns its port for the session's lifetime and serializes every
//! command/response exchange behind the [`SharedPort`] mutex. The port is
//! type-erased so tests can substitute a `tokio::io::duplex` pipe for real
//! hardware.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, BufReader};
use tokio::sync::Mutex;

/// Trait alias for async serial port I/O.
///
/// Satisfied by `tokio_serial::SerialStream` (hardware) and
/// `tokio::io::DuplexStream` (tests) alike.
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}

/// Type-erased boxed serial port.
pub type DynSerial = Box<dyn SerialPortIO>;

/// Exclusively held, buffered serial port.
///
/// The `BufReader` enables `read_until` for CR-terminated line protocols;
/// the mutex guarantees one in-flight exchange at a time.
pub type SharedPort = Arc<Mutex<BufReader<DynSerial>>>;

/// Wrap a type-erased port for shared use.
pub fn share(port: DynSerial) -> SharedPort {
    Arc::new(Mutex::new(BufReader::new(port)))
}

/// Open a serial port with 8N1 framing and no flow control.
///
/// Opening goes through `spawn_blocking` so a slow USB enumeration does not
/// stall the runtime. `device_name` only decorates error messages.
pub async fn open_port(
    path: &str,
    baud_rate: u32,
    device_name: &str,
) -> anyhow::Result<tokio_serial::SerialStream> {
    use anyhow::Context;
    use tokio_serial::SerialPortBuilderExt;

    tracing::debug!(path, baud_rate, device = device_name, "opening serial port");

    let path = path.to_string();
    let device_name = device_name.to_string();

    tokio::task::spawn_blocking(move || {
        tokio_serial::new(&path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .context(format!("failed to open {device_name} port {path}"))
    })
    .await
    .context("spawn_blocking for serial port open failed")?
}

/// Read and discard whatever is sitting unread on the line.
///
/// Called before every command write so a stale response from an earlier,
/// timed-out exchange cannot be mistaken for the new command's reply.
/// Returns the number of bytes discarded.
pub async fn drain_input<R: AsyncRead + Unpin>(port: &mut R, settle_ms: u64) -> usize {
    let mut discard = [0u8; 64];
    let mut total = 0usize;

    loop {
        match tokio::time::timeout(Duration::from_millis(settle_ms), port.read(&mut discard)).await
        {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => total += n,
            Ok(Err(_)) | Err(_) => break,
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn shared_port_reads_cr_terminated_lines() {
        let (mut host, device) = tokio::io::duplex(64);
        let port = share(Box::new(device));

        host.write_all(b"P 100 -200\r").await.unwrap();

        let mut guard = port.lock().await;
        let mut line = Vec::new();
        guard.read_until(b'\r', &mut line).await.unwrap();

        assert_eq!(line, b"P 100 -200\r");
    }

    #[tokio::test]
    async fn drain_discards_stale_bytes() {
        let (mut host, mut device) = tokio::io::duplex(64);

        host.write_all(b"stale junk\r").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let discarded = drain_input(&mut device, 10).await;
        assert_eq!(discarded, 11);

        // Nothing left afterwards.
        assert_eq!(drain_input(&mut device, 10).await, 0);
    }

    #[tokio::test]
    async fn shared_port_clones_refer_to_one_port() {
        let (mut host, device) = tokio::io::duplex(64);
        let port = share(Box::new(device));
        let clone = port.clone();

        host.write_all(b"x\r").await.unwrap();

        let mut guard = clone.lock().await;
        let mut line = Vec::new();
        guard.read_until(b'\r', &mut line).await.unwrap();
        assert_eq!(line, b"x\r");
    }
}
