//! Monitor bridge: the relay operator's local chat session.
//!
//! Two anonymous pipes connect the relay loop and the monitor:
//!
//! ```text
//!   monitor --(to_relay)-->  [ monitor -> relay pipe ]  --(from_monitor)--> relay
//!   monitor <-(from_relay)-- [ relay -> monitor pipe ]  <--(to_monitor)---- relay
//! ```
//!
//! [`MonitorBridge::split`] hands each side exactly the two ends it uses, so
//! neither side ever holds both ends of one pipe. Closing a side's write end
//! is how the other side learns it has gone.

use std::io;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::unix::pipe;
use tracing::debug;

use chatrelay_core::fd::{Pipe, nonblocking_pipe};
use chatrelay_core::{DuplexError, Duplexer, Side};

use crate::error::RelayError;
use crate::router::PeerSink;

/// Both monitor pipes, before the split.
#[derive(Debug)]
pub struct MonitorBridge {
    monitor_to_relay: Pipe,
    relay_to_monitor: Pipe,
}

/// The relay's ends of the bridge.
#[derive(Debug)]
pub struct RelayEnd {
    /// Read end of the monitor -> relay pipe.
    pub from_monitor: pipe::Receiver,
    /// Write end of the relay -> monitor pipe.
    pub to_monitor: pipe::Sender,
}

/// The monitor's ends of the bridge.
#[derive(Debug)]
pub struct MonitorEnd {
    /// Read end of the relay -> monitor pipe.
    pub from_relay: pipe::Receiver,
    /// Write end of the monitor -> relay pipe.
    pub to_relay: pipe::Sender,
}

impl MonitorBridge {
    /// Create both pipes, already non-blocking.
    pub fn open() -> Result<Self, RelayError> {
        Ok(Self {
            monitor_to_relay: nonblocking_pipe()?,
            relay_to_monitor: nonblocking_pipe()?,
        })
    }

    /// Hand out the ends. Must run inside the tokio runtime.
    pub fn split(self) -> Result<(RelayEnd, MonitorEnd), RelayError> {
        let Self {
            monitor_to_relay,
            relay_to_monitor,
        } = self;

        let relay = RelayEnd {
            from_monitor: pipe::Receiver::from_owned_fd_unchecked(monitor_to_relay.read)
                .map_err(RelayError::PipeRegister)?,
            to_monitor: pipe::Sender::from_owned_fd_unchecked(relay_to_monitor.write)
                .map_err(RelayError::PipeRegister)?,
        };
        let monitor = MonitorEnd {
            from_relay: pipe::Receiver::from_owned_fd_unchecked(relay_to_monitor.read)
                .map_err(RelayError::PipeRegister)?,
            to_relay: pipe::Sender::from_owned_fd_unchecked(monitor_to_relay.write)
                .map_err(RelayError::PipeRegister)?,
        };
        Ok((relay, monitor))
    }
}

impl PeerSink for pipe::Sender {
    fn offer(&self, chunk: &[u8]) -> io::Result<usize> {
        self.try_write(chunk)
    }
}

/// Run the operator session: terminal input goes to the relay, relay traffic
/// goes to the terminal, until either side hangs up.
///
/// Prints a farewell line on the terminal once the session ends.
pub async fn run_monitor<I, O>(
    end: MonitorEnd,
    terminal_in: I,
    mut terminal_out: O,
    chunk_size: usize,
) -> Result<Side, DuplexError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let MonitorEnd {
        from_relay,
        to_relay,
    } = end;

    let side = Duplexer::new(terminal_in, &mut terminal_out, from_relay, to_relay)
        .with_chunk_size(chunk_size)
        .run()
        .await?;

    let farewell: &[u8] = match side {
        Side::Local => b"Connection ended, Goodbye\n",
        Side::Remote => b"Relay closed, Goodbye\n",
    };
    if let Err(e) = terminal_out.write_all(farewell).await {
        debug!(error = %e, "Writing monitor farewell failed");
    }
    if let Err(e) = terminal_out.flush().await {
        debug!(error = %e, "Flushing monitor terminal failed");
    }
    Ok(side)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, duplex, split};

    use super::*;

    #[tokio::test]
    async fn ends_are_crossed_between_sides() {
        let (relay, mut monitor) = MonitorBridge::open().unwrap().split().unwrap();

        monitor.to_relay.write_all(b"op says hi\n").await.unwrap();
        relay.from_monitor.readable().await.unwrap();
        let mut buf = [0u8; 64];
        let n = relay.from_monitor.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"op says hi\n");

        assert_eq!(relay.to_monitor.offer(b"client text").unwrap(), 11);
        let mut buf = [0u8; 11];
        monitor.from_relay.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"client text");
    }

    #[tokio::test]
    async fn empty_pipe_would_block() {
        let (relay, _monitor) = MonitorBridge::open().unwrap().split().unwrap();
        let mut buf = [0u8; 8];
        let err = relay.from_monitor.try_read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[tokio::test]
    async fn monitor_session_bridges_terminal_and_relay() {
        let (relay, monitor) = MonitorBridge::open().unwrap().split().unwrap();
        let (term, mut term_far) = duplex(1024);
        let (term_in, term_out) = split(term);
        let session = tokio::spawn(run_monitor(monitor, term_in, term_out, 1024));

        term_far.write_all(b"from operator\n").await.unwrap();
        relay.from_monitor.readable().await.unwrap();
        let mut buf = [0u8; 64];
        let n = relay.from_monitor.try_read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"from operator\n");

        relay.to_monitor.offer(b"from client\n").unwrap();
        let mut buf = [0u8; 12];
        term_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"from client\n");

        // Relay going away closes its write end: the monitor sees a hang-up.
        drop(relay);
        let side = tokio::time::timeout(Duration::from_secs(5), session)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(side, Side::Remote);

        let mut farewell = String::new();
        term_far.read_to_string(&mut farewell).await.unwrap();
        assert_eq!(farewell, "Relay closed, Goodbye\n");
    }

    #[tokio::test]
    async fn terminal_eof_closes_monitor_to_relay_pipe() {
        let (relay, monitor) = MonitorBridge::open().unwrap().split().unwrap();
        let (input_far, input) = duplex(64);
        let (output, mut output_far) = duplex(64);
        let session = tokio::spawn(run_monitor(monitor, input, output, 1024));

        drop(input_far);
        assert_eq!(session.await.unwrap().unwrap(), Side::Local);

        let mut farewell = String::new();
        output_far.read_to_string(&mut farewell).await.unwrap();
        assert_eq!(farewell, "Connection ended, Goodbye\n");

        relay.from_monitor.readable().await.unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(relay.from_monitor.try_read(&mut buf).unwrap(), 0);
    }
}
