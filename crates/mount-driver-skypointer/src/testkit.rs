//! Scripted serial device for driver tests.
//!
//! Sits on the far end of a `tokio::io::duplex` pipe, answers each incoming
//! CR-terminated command according to a script, and forwards every received
//! command (terminator stripped) on a channel so tests can assert exactly
//! what went over the wire.

use std::collections::VecDeque;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::transport::Transport;

/// One scripted reaction to an incoming command.
pub(crate) enum Reply {
    /// Answer with this payload (terminator appended).
    Line(&'static str),
    /// Swallow the command and stay silent, forcing a timeout.
    Silence,
}

/// Spawn a scripted device and return a transport talking to it.
///
/// Commands beyond the end of the script are swallowed silently.
pub(crate) fn scripted_transport(
    script: Vec<Reply>,
) -> (Transport, mpsc::UnboundedReceiver<String>) {
    let (host, device) = tokio::io::duplex(256);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut script: VecDeque<Reply> = script.into();
        let mut reader = BufReader::new(host);
        loop {
            let mut line = Vec::new();
            match reader.read_until(b'\r', &mut line).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let _ = tx.send(String::from_utf8_lossy(&line).into_owned());

            match script.pop_front() {
                Some(Reply::Line(payload)) => {
                    let framed = format!("{payload}\r");
                    if reader.get_mut().write_all(framed.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Some(Reply::Silence) | None => {}
            }
        }
    });

    (Transport::from_raw(Box::new(device)), rx)
}

/// Collect every command the scripted device has received so far.
pub(crate) fn received_commands(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut commands = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        commands.push(cmd);
    }
    commands
}
