//! Two-endpoint byte pump.
//!
//! Shuttles chunks between a local terminal and exactly one remote peer (a
//! relay socket for the client program, the monitor pipes for the relay
//! operator). No buffering beyond one chunk per direction, no retries.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::config::DEFAULT_CHUNK_SIZE;

/// One end of the duplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The user's terminal.
    Local,
    /// The socket or pipe on the other end.
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("terminal"),
            Self::Remote => f.write_str("peer"),
        }
    }
}

/// Duplexer errors.
#[derive(Debug, thiserror::Error)]
pub enum DuplexError {
    #[error("reading from {side} failed: {source}")]
    Read {
        side: Side,
        #[source]
        source: io::Error,
    },
}

/// Bidirectional forwarder between a terminal and one peer.
pub struct Duplexer<LR, LW, RR, RW> {
    local_in: LR,
    local_out: LW,
    remote_in: RR,
    remote_out: RW,
    chunk_size: usize,
}

impl<LR, LW, RR, RW> Duplexer<LR, LW, RR, RW>
where
    LR: AsyncRead + Unpin,
    LW: AsyncWrite + Unpin,
    RR: AsyncRead + Unpin,
    RW: AsyncWrite + Unpin,
{
    pub const fn new(local_in: LR, local_out: LW, remote_in: RR, remote_out: RW) -> Self {
        Self {
            local_in,
            local_out,
            remote_in,
            remote_out,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Forward chunks both ways until one side hangs up.
    ///
    /// Returns the side whose read hit end-of-stream. When the terminal hangs
    /// up, the remote write half is shut down before returning.
    pub async fn run(mut self) -> Result<Side, DuplexError> {
        let mut local_buf = vec![0u8; self.chunk_size];
        let mut remote_buf = vec![0u8; self.chunk_size];

        loop {
            tokio::select! {
                read = self.local_in.read(&mut local_buf) => {
                    let n = read.map_err(|source| DuplexError::Read { side: Side::Local, source })?;
                    if n == 0 {
                        debug!("Terminal input reached end of stream");
                        if let Err(e) = self.remote_out.shutdown().await {
                            debug!(error = %e, "Shutting down peer write half failed");
                        }
                        return Ok(Side::Local);
                    }
                    forward(&mut self.remote_out, &local_buf[..n], Side::Remote).await;
                }
                read = self.remote_in.read(&mut remote_buf) => {
                    let n = read.map_err(|source| DuplexError::Read { side: Side::Remote, source })?;
                    if n == 0 {
                        debug!("Peer reached end of stream");
                        return Ok(Side::Remote);
                    }
                    forward(&mut self.local_out, &remote_buf[..n], Side::Local).await;
                }
            }
        }
    }
}

/// Write one chunk. Failures are logged and the chunk is dropped.
async fn forward<W: AsyncWrite + Unpin>(out: &mut W, chunk: &[u8], to: Side) {
    let result = async {
        out.write_all(chunk).await?;
        out.flush().await
    }
    .await;
    if let Err(e) = result {
        warn!(to = %to, bytes = chunk.len(), error = %e, "Write failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::io::{duplex, split};

    use super::*;

    #[tokio::test]
    async fn forwards_terminal_input_to_peer_and_back() {
        let (term, mut term_far) = duplex(1024);
        let (sock, mut sock_far) = duplex(1024);
        let (term_in, term_out) = split(term);
        let (sock_in, sock_out) = split(sock);
        let task = tokio::spawn(Duplexer::new(term_in, term_out, sock_in, sock_out).run());

        term_far.write_all(b"hello\n").await.unwrap();
        let mut buf = [0u8; 6];
        sock_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello\n");

        sock_far.write_all(b"hi there\n").await.unwrap();
        let mut buf = [0u8; 9];
        term_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hi there\n");

        drop(sock_far);
        assert_eq!(task.await.unwrap().unwrap(), Side::Remote);
    }

    #[tokio::test]
    async fn terminal_eof_hangs_up_and_closes_peer_write_half() {
        let (term, term_far) = duplex(64);
        let (sock, mut sock_far) = duplex(64);
        let (term_in, term_out) = split(term);
        let (sock_in, sock_out) = split(sock);
        let task = tokio::spawn(Duplexer::new(term_in, term_out, sock_in, sock_out).run());

        drop(term_far);
        assert_eq!(task.await.unwrap().unwrap(), Side::Local);

        let mut rest = Vec::new();
        sock_far.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn chunk_size_bounds_each_forward() {
        let (term, mut term_far) = duplex(1024);
        let (sock, mut sock_far) = duplex(1024);
        let (term_in, term_out) = split(term);
        let (sock_in, sock_out) = split(sock);
        let task = tokio::spawn(
            Duplexer::new(term_in, term_out, sock_in, sock_out)
                .with_chunk_size(4)
                .run(),
        );

        term_far.write_all(b"0123456789").await.unwrap();
        let mut buf = [0u8; 10];
        sock_far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"0123456789");

        drop(term_far);
        assert_eq!(task.await.unwrap().unwrap(), Side::Local);
    }

    #[tokio::test]
    async fn loopback_echo_returns_original_bytes() {
        let (term, mut term_far) = duplex(4096);
        let (sock, sock_far) = duplex(4096);
        let (term_in, term_out) = split(term);
        let (sock_in, sock_out) = split(sock);
        let task = tokio::spawn(Duplexer::new(term_in, term_out, sock_in, sock_out).run());

        let echo = tokio::spawn(async move {
            let (mut r, mut w) = split(sock_far);
            tokio::io::copy(&mut r, &mut w).await
        });

        let message: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        term_far.write_all(&message).await.unwrap();
        let mut back = vec![0u8; message.len()];
        term_far.read_exact(&mut back).await.unwrap();
        assert_eq!(back, message);

        drop(term_far);
        assert_eq!(task.await.unwrap().unwrap(), Side::Local);
        echo.await.unwrap().unwrap();
    }
}
