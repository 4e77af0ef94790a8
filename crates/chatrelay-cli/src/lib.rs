//! chatrelay Client Library
//!
//! Connects to a chat relay and bridges it with the terminal.

pub mod connection;
pub mod session;
