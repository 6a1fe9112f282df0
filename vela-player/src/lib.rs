//! # Vela Player Library (vela-player)
//!
//! Drives an interactive installation: sensor readings are reduced to an
//! aggregated derivative, compared against per-level thresholds, and the
//! selected play level drives layered playback through external player
//! processes.
//!
//! **Architecture:** inputs → EventBus → AGD processor → EventBus →
//! PlayerManager actor → supervised player processes. The HTTP API reads and
//! writes the same bus.

pub mod agd;
pub mod api;
pub mod error;
pub mod inputs;
pub mod logging;
pub mod playback;

pub use error::{Error, Result};
