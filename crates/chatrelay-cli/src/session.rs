//! Interactive chat session over an established relay connection.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use chatrelay_core::{ClientConfig, DuplexError, Duplexer, Side};

/// Line shown once the connection is up, followed by the input prompt.
pub fn banner(config: &ClientConfig) -> String {
    format!("Connected to {}:{}...\n> ", config.host, config.port)
}

/// Write the banner to the terminal.
pub async fn greet<O: AsyncWrite + Unpin>(
    terminal_out: &mut O,
    config: &ClientConfig,
) -> std::io::Result<()> {
    terminal_out.write_all(banner(config).as_bytes()).await?;
    terminal_out.flush().await
}

/// Shuttle chat between the terminal and the relay until either hangs up.
///
/// Returns which side ended the session.
pub async fn run_session<I, O>(
    stream: TcpStream,
    terminal_in: I,
    terminal_out: O,
    chunk_size: usize,
) -> Result<Side, DuplexError>
where
    I: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let (socket_in, socket_out) = stream.into_split();
    Duplexer::new(terminal_in, terminal_out, socket_in, socket_out)
        .with_chunk_size(chunk_size)
        .run()
        .await
}
