//! Relay connection setup.

use std::io;

use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, info};

use chatrelay_core::ClientConfig;

/// Connect to the relay named by `config`.
///
/// The host is resolved by name and every resolved address is tried in turn.
/// The error from the last attempt is reported if none succeeds.
pub async fn connect(config: &ClientConfig) -> Result<TcpStream, ConnectionError> {
    let target = format!("{}:{}", config.host, config.port);
    let addrs = lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|source| ConnectionError::Resolve {
            target: target.clone(),
            source,
        })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                info!(addr = %addr, "Connected");
                return Ok(stream);
            }
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    Err(match last_err {
        Some(source) => ConnectionError::ConnectFailed { target, source },
        None => ConnectionError::NoAddress { target },
    })
}

/// Connection errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("resolving {target} failed: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("{target} resolved to no addresses")]
    NoAddress { target: String },

    #[error("connect to {target} failed: {source}")]
    ConnectFailed {
        target: String,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_to_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect(&ClientConfig::new("127.0.0.1", port)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[tokio::test]
    async fn closed_port_is_a_connect_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let err = connect(&ClientConfig::new("127.0.0.1", port))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectionError::ConnectFailed { .. }));
        assert!(err.to_string().starts_with(&format!("connect to 127.0.0.1:{port} failed")));
    }
}
