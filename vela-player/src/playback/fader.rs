//! Layer alpha ramps
//!
//! A fade sets the layer alpha every [`FADE_STEP`], following a
//! [`FadeCurve`] over the configured duration, and always finishes on the
//! exact end value. Layers that cannot change alpha are left untouched.

use super::process::LayerProcess;
use crate::error::Result;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use vela_common::config::LevelConfig;
use vela_common::fade_curves::{ALPHA_OPAQUE, ALPHA_TRANSPARENT};
use vela_common::FadeCurve;

/// Interval between alpha updates (about twice the frame rate of 25 fps media)
pub const FADE_STEP: Duration = Duration::from_millis(19);

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    In,
    Out,
}

/// One configured fade
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fader {
    duration: Duration,
    curve: FadeCurve,
}

impl Fader {
    pub fn new(duration: Duration, curve: FadeCurve) -> Self {
        Self { duration, curve }
    }

    /// Fade-in configured for `level`
    pub fn fade_in_for(level: &LevelConfig) -> Self {
        Self::new(level.fade_in(), level.fade_curve)
    }

    /// Fade-out configured for `level`
    pub fn fade_out_for(level: &LevelConfig) -> Self {
        Self::new(level.fade_out(), level.fade_curve)
    }

    pub fn is_instant(&self) -> bool {
        self.duration.is_zero()
    }

    /// Ramp `process` from transparent to opaque
    pub async fn fade_in<P: LayerProcess>(&self, process: &P) -> Result<()> {
        self.run(process, Direction::In).await
    }

    /// Ramp `process` from opaque to transparent
    pub async fn fade_out<P: LayerProcess>(&self, process: &P) -> Result<()> {
        self.run(process, Direction::Out).await
    }

    fn alpha_at(&self, direction: Direction, position: f32) -> u8 {
        match direction {
            Direction::In => self.curve.alpha_in(position),
            Direction::Out => self.curve.alpha_out(position),
        }
    }

    async fn run<P: LayerProcess>(&self, process: &P, direction: Direction) -> Result<()> {
        if !process.supports_alpha() {
            debug!(layer_id = %process.layer_id(), "alpha control unavailable, fade skipped");
            return Ok(());
        }

        let end = match direction {
            Direction::In => ALPHA_OPAQUE,
            Direction::Out => ALPHA_TRANSPARENT,
        };

        if !self.duration.is_zero() {
            debug!(
                layer_id = %process.layer_id(),
                ?direction,
                duration_ms = self.duration.as_millis() as u64,
                curve = %self.curve,
                "fade starting"
            );

            let start = Instant::now();
            let total = self.duration.as_secs_f32();
            let mut last_alpha = None;

            loop {
                let elapsed = start.elapsed();
                if elapsed >= self.duration {
                    break;
                }

                let alpha = self.alpha_at(direction, elapsed.as_secs_f32() / total);
                if last_alpha != Some(alpha) {
                    trace!(alpha, "alpha step");
                    process.set_alpha(alpha).await?;
                    last_alpha = Some(alpha);
                }
                tokio::time::sleep(FADE_STEP).await;
            }
        }

        process.set_alpha(end).await?;
        debug!(layer_id = %process.layer_id(), alpha = end, "fade completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    struct RecordingLayer {
        id: Uuid,
        alpha_control: bool,
        alphas: Arc<Mutex<Vec<u8>>>,
    }

    impl RecordingLayer {
        fn new(alpha_control: bool) -> Self {
            Self {
                id: Uuid::new_v4(),
                alpha_control,
                alphas: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn alphas(&self) -> Vec<u8> {
            self.alphas.lock().unwrap().clone()
        }
    }

    impl LayerProcess for RecordingLayer {
        fn layer_id(&self) -> Uuid {
            self.id
        }

        fn level(&self) -> usize {
            1
        }

        fn supports_alpha(&self) -> bool {
            self.alpha_control
        }

        async fn set_alpha(&self, alpha: u8) -> Result<()> {
            self.alphas.lock().unwrap().push(alpha);
            Ok(())
        }

        async fn stop(self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_ends_opaque_and_rises() {
        let layer = RecordingLayer::new(true);
        let fader = Fader::new(Duration::from_millis(500), FadeCurve::Linear);

        fader.fade_in(&layer).await.unwrap();

        let alphas = layer.alphas();
        assert_eq!(alphas.first(), Some(&ALPHA_TRANSPARENT));
        assert_eq!(alphas.last(), Some(&ALPHA_OPAQUE));
        assert!(alphas.windows(2).all(|w| w[0] <= w[1]), "{:?}", alphas);
        // 500ms / 19ms steps, plus the final value
        assert!(alphas.len() >= 20 && alphas.len() <= 30, "{} steps", alphas.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_ends_transparent_and_falls() {
        let layer = RecordingLayer::new(true);
        let fader = Fader::new(Duration::from_millis(300), FadeCurve::SCurve);

        fader.fade_out(&layer).await.unwrap();

        let alphas = layer.alphas();
        assert_eq!(alphas.first(), Some(&ALPHA_OPAQUE));
        assert_eq!(alphas.last(), Some(&ALPHA_TRANSPARENT));
        assert!(alphas.windows(2).all(|w| w[0] >= w[1]), "{:?}", alphas);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_takes_configured_duration() {
        let layer = RecordingLayer::new(true);
        let fader = Fader::new(Duration::from_secs(2), FadeCurve::Linear);

        let start = Instant::now();
        fader.fade_in(&layer).await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(2) + FADE_STEP * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_sets_end_value_immediately() {
        let layer = RecordingLayer::new(true);
        let fader = Fader::new(Duration::ZERO, FadeCurve::Linear);
        assert!(fader.is_instant());

        fader.fade_in(&layer).await.unwrap();
        fader.fade_out(&layer).await.unwrap();

        assert_eq!(layer.alphas(), vec![ALPHA_OPAQUE, ALPHA_TRANSPARENT]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_alpha_control_skips_fade() {
        let layer = RecordingLayer::new(false);
        let fader = Fader::new(Duration::from_secs(1), FadeCurve::Linear);

        let start = Instant::now();
        fader.fade_in(&layer).await.unwrap();

        assert!(layer.alphas().is_empty());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_level_config_fades() {
        let level = LevelConfig {
            folder: "/media/1".into(),
            fadein: 1.0,
            fadeout: 0.5,
            fade_curve: FadeCurve::EqualPower,
        };
        assert_eq!(
            Fader::fade_in_for(&level),
            Fader::new(Duration::from_secs(1), level.fade_curve)
        );
        assert_eq!(
            Fader::fade_out_for(&level),
            Fader::new(Duration::from_millis(500), level.fade_curve)
        );
    }
}
