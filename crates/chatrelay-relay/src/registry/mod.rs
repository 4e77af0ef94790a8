//! Connection bookkeeping for the relay.

pub mod table;

pub use table::{ConnectionTable, SlotIndex, TableFull};
