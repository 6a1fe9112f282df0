//! Fade curve implementations for layer alpha ramps
//!
//! A fade maps normalized time through the fade (0.0 to 1.0) to an opacity
//! multiplier (0.0 to 1.0), which the player turns into an 8-bit alpha value
//! for the external playback process.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fully opaque layer alpha
pub const ALPHA_OPAQUE: u8 = 255;

/// Fully transparent layer alpha
pub const ALPHA_TRANSPARENT: u8 = 0;

/// Fade curve types
///
/// - Linear: Constant rate of change
/// - Exponential: Slow start, fast finish
/// - Logarithmic: Fast start, slow finish
/// - SCurve: Smooth acceleration and deceleration
/// - EqualPower: sin/cos pair, keeps combined opacity near constant while two
///   layers overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// v(t) = t
    Linear,

    /// v(t) = t²
    Exponential,

    /// v(t) = √t (fade-in), (1-t)² (fade-out)
    Logarithmic,

    /// v(t) = 0.5 × (1 - cos(π × t))
    #[serde(alias = "cosine")]
    SCurve,

    /// v(t) = sin(t × π/2)
    EqualPower,
}

impl FadeCurve {
    /// Opacity multiplier at `position` through a fade-in
    ///
    /// `position` is clamped to 0.0..=1.0; the result rises from 0.0 to 1.0.
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::Exponential => t * t,
            FadeCurve::Logarithmic => t.sqrt(),
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Opacity multiplier at `position` through a fade-out
    ///
    /// `position` is clamped to 0.0..=1.0; the result falls from 1.0 to 0.0.
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::Exponential | FadeCurve::Logarithmic => {
                let inv = 1.0 - t;
                inv * inv
            }
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Layer alpha at `position` through a fade-in
    pub fn alpha_in(&self, position: f32) -> u8 {
        to_alpha(self.calculate_fade_in(position))
    }

    /// Layer alpha at `position` through a fade-out
    pub fn alpha_out(&self, position: f32) -> u8 {
        to_alpha(self.calculate_fade_out(position))
    }

    /// Canonical settings-file name
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::Exponential => "exponential",
            FadeCurve::Logarithmic => "logarithmic",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }
}

fn to_alpha(multiplier: f32) -> u8 {
    (multiplier.clamp(0.0, 1.0) * ALPHA_OPAQUE as f32).round() as u8
}

impl Default for FadeCurve {
    /// Linear ramps, matching a plain alpha interpolation
    fn default() -> Self {
        FadeCurve::Linear
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
