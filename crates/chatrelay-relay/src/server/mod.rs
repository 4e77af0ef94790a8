//! Relay server: listening socket setup and the relay loop.

pub mod listener;
pub mod relay_loop;

pub use listener::bind_listener;
pub use relay_loop::{Peer, RelayLoop};
