//! Sensor and control inputs feeding the event bus

pub mod network;

pub use network::{parse_line, NetworkInput};
