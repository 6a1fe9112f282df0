//! # Vela Common Library
//!
//! Shared code for the Vela installation controller:
//! - Event types (VelaEvent enum) and the EventBus
//! - Settings model and loading
//! - Fade curve definitions used for layer alpha ramps

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
