//! Listening socket setup.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpSocket};

use crate::error::RelayError;

/// Bind and listen on `addr`.
///
/// `SO_REUSEADDR` lets a restarted relay rebind while old connections sit in
/// `TIME_WAIT`; a port held by a live listener still fails with
/// [`RelayError::Bind`]. Any socket created before the failure is closed.
pub fn bind_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener, RelayError> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(RelayError::Socket)?;

    socket.set_reuseaddr(true).map_err(RelayError::Socket)?;
    socket
        .bind(addr)
        .map_err(|source| RelayError::Bind { addr, source })?;
    socket
        .listen(backlog)
        .map_err(|source| RelayError::Listen { addr, source })
}
