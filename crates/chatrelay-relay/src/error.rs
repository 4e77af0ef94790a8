//! Relay error types.

use std::io;
use std::net::SocketAddr;

/// Fatal relay errors. Anything else is logged and survived.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("creating listening socket failed: {0}")]
    Socket(#[source] io::Error),

    #[error("bind to {addr} failed: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listen on {addr} failed: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("creating monitor pipes failed: {0}")]
    Pipe(#[from] chatrelay_core::Error),

    #[error("registering monitor pipe failed: {0}")]
    PipeRegister(#[source] io::Error),

    #[error("readiness wait failed: {0}")]
    Wait(#[source] io::Error),
}
