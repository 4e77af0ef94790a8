//! Chunk routing from one peer to the rest of the broadcast set.

pub mod broadcast;

pub use broadcast::{BroadcastReport, Delivery, PeerSink, deliver, fan_out};
