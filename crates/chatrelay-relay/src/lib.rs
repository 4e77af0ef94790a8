//! chatrelay Relay Server Library
//!
//! Core functionality for the chatrelay relay:
//! - Fixed-capacity connection table with slot reuse
//! - Best-effort broadcast fan-out
//! - The readiness-driven relay loop
//! - The monitor bridge giving the operator a local chat session

pub mod error;
pub mod monitor;
pub mod registry;
pub mod router;
pub mod server;

pub use error::RelayError;
pub use monitor::{MonitorBridge, MonitorEnd, RelayEnd, run_monitor};
pub use registry::{ConnectionTable, SlotIndex, TableFull};
pub use server::{RelayLoop, bind_listener};
