//! `chatrelay` Core Library
//!
//! Shared functionality for `chatrelay` components:
//! - Configuration resolution
//! - Nonblocking descriptor adapter and anonymous pipes
//! - The terminal/peer duplexer used by the client and the relay monitor
//! - Common error types

pub mod config;
pub mod duplex;
pub mod error;
#[cfg(unix)]
pub mod fd;
pub mod tracing_init;

pub use config::{ClientConfig, RelayConfig};
pub use duplex::{DuplexError, Duplexer, Side};
pub use error::{Error, Result};
