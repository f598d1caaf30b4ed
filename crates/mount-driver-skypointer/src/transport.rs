//! Serial transport session.
//!
//! One [`Transport`] owns the device's serial port for the driver's
//! lifetime; every protocol exchange goes through [`Transport::execute`] and
//! nothing else touches the port. Exchanges are strictly sequential: the
//! port mutex is held for the whole write/read cycle, and the calling task
//! blocks for up to [`RESPONSE_TIMEOUT`] on a silent device.

use std::pin::Pin;
use std::time::Duration;

use mount_core::serial::{drain_input, share, DynSerial, SharedPort};
use mount_core::TransportError;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use crate::protocol::TERMINATOR;

/// Fixed deadline for a response line.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long the pre-write drain waits for further stale bytes.
const DRAIN_SETTLE_MS: u64 = 10;

/// Exclusive session on the device's serial line.
pub struct Transport {
    port: SharedPort,
}

impl Transport {
    /// Wrap an already-shared port.
    pub fn new(port: SharedPort) -> Self {
        Self { port }
    }

    /// Take ownership of a raw port (hardware stream or test pipe).
    pub fn from_raw(port: DynSerial) -> Self {
        Self::new(share(port))
    }

    /// Run one command/response exchange.
    ///
    /// Stale unread input is discarded before the write, the command buffer
    /// is written whole, and the response is read until the CR terminator or
    /// the fixed deadline. On timeout any partial bytes are discarded, since
    /// a half response is unusable. The returned payload has the terminator
    /// stripped; an empty payload is valid for fire-and-forget commands.
    pub async fn execute(&self, cmd: &str) -> Result<String, TransportError> {
        let mut guard = self.port.lock().await;

        // Stale-response protection: drop bytes a previous timed-out
        // exchange may have left both in the reader's buffer and on the line.
        let mut stale = guard.buffer().len();
        if stale > 0 {
            Pin::new(&mut *guard).consume(stale);
        }
        stale += drain_input(guard.get_mut(), DRAIN_SETTLE_MS).await;
        if stale > 0 {
            trace!(bytes = stale, "discarded stale input");
        }

        trace!(cmd = cmd.trim_end_matches('\r'), "CMD");
        let writer = guard.get_mut();
        writer
            .write_all(cmd.as_bytes())
            .await
            .map_err(TransportError::Write)?;
        writer.flush().await.map_err(TransportError::Write)?;

        let mut line = Vec::new();
        match tokio::time::timeout(RESPONSE_TIMEOUT, guard.read_until(TERMINATOR, &mut line)).await
        {
            Err(_) => return Err(TransportError::Timeout(RESPONSE_TIMEOUT)),
            Ok(Err(e)) => return Err(TransportError::Read(e)),
            Ok(Ok(_)) => {}
        }

        if line.last() == Some(&TERMINATOR) {
            line.pop();
        } else {
            // EOF before the terminator: the device went away mid-response.
            return Err(TransportError::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "port closed before response terminator",
            )));
        }

        let payload = String::from_utf8_lossy(&line).into_owned();
        debug!(cmd = cmd.trim_end_matches('\r'), response = %payload, "exchange");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    /// Host side helper: answer the next command with `reply`.
    async fn answer(host: &mut tokio::io::DuplexStream, reply: &str) -> String {
        let mut cmd = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            host.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\r' {
                break;
            }
            cmd.push(byte[0]);
        }
        host.write_all(reply.as_bytes()).await.unwrap();
        String::from_utf8(cmd).unwrap()
    }

    #[tokio::test]
    async fn execute_strips_terminator() {
        let (mut host, device) = tokio::io::duplex(64);
        let transport = Transport::from_raw(Box::new(device));

        let exchange = tokio::join!(transport.execute("P\r"), answer(&mut host, "P 10 20\r"));
        assert_eq!(exchange.0.unwrap(), "P 10 20");
        assert_eq!(exchange.1, "P");
    }

    #[tokio::test]
    async fn execute_accepts_empty_payload() {
        let (mut host, device) = tokio::io::duplex(64);
        let transport = Transport::from_raw(Box::new(device));

        let exchange = tokio::join!(transport.execute("S\r"), answer(&mut host, "\r"));
        assert_eq!(exchange.0.unwrap(), "");
    }

    #[tokio::test]
    async fn execute_discards_stale_input_before_writing() {
        let (mut host, device) = tokio::io::duplex(256);
        let transport = Transport::from_raw(Box::new(device));

        // A leftover line from an exchange that timed out earlier.
        host.write_all(b"P 999 999\r").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let exchange = tokio::join!(transport.execute("P\r"), answer(&mut host, "P 1 2\r"));
        assert_eq!(exchange.0.unwrap(), "P 1 2");
    }

    #[tokio::test(start_paused = true)]
    async fn execute_times_out_on_silent_device() {
        let (host, device) = tokio::io::duplex(64);
        let transport = Transport::from_raw(Box::new(device));

        let err = transport.execute("P\r").await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(t) if t == RESPONSE_TIMEOUT));

        drop(host);
    }

    #[tokio::test]
    async fn execute_reports_truncated_response_as_read_error() {
        let (mut host, device) = tokio::io::duplex(64);
        let transport = Transport::from_raw(Box::new(device));

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 8];
            let _ = host.read(&mut buf).await;
            // Partial response, then the device goes away.
            host.write_all(b"P 1").await.unwrap();
        });

        let err = transport.execute("P\r").await.unwrap_err();
        assert!(matches!(err, TransportError::Read(_)));
        responder.await.unwrap();
    }
}
