//! Test helper modules for vela-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - MockSupervisor: records layer spawn/stop/alpha calls in order, injects
//!   spawn failures and natural exits
//! - Level and media fixtures

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;
use vela_common::config::LevelConfig;
use vela_common::events::PlayerState;
use vela_common::FadeCurve;
use vela_player::playback::{
    ExitSender, LayerExit, LayerProcess, MediaLibrary, ProcessSupervisor, SpawnRequest,
};
use vela_player::{Error, Result};

/// One recorded supervisor interaction
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Spawn {
        layer_id: Uuid,
        level: usize,
        looping: bool,
        alpha: u8,
    },
    Alpha {
        layer_id: Uuid,
        level: usize,
        alpha: u8,
    },
    Stop {
        layer_id: Uuid,
        level: usize,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    failing_levels: HashSet<usize>,
    exit_senders: HashMap<Uuid, (usize, ExitSender)>,
}

/// In-memory [`ProcessSupervisor`]
#[derive(Clone, Default)]
pub struct MockSupervisor {
    state: Arc<Mutex<MockState>>,
    alpha_control: bool,
}

impl MockSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes accept alpha changes, so fades run
    pub fn with_alpha_control() -> Self {
        Self {
            alpha_control: true,
            ..Self::default()
        }
    }

    /// Make every spawn for `level` fail
    pub fn fail_spawns_for(&self, level: usize) {
        self.state.lock().unwrap().failing_levels.insert(level);
    }

    pub fn allow_spawns_for(&self, level: usize) {
        self.state.lock().unwrap().failing_levels.remove(&level);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Spawn and stop calls only, as (kind, level)
    pub fn lifecycle(&self) -> Vec<(&'static str, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Spawn { level, .. } => Some(("spawn", level)),
                Call::Stop { level, .. } => Some(("stop", level)),
                Call::Alpha { .. } => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Most recently spawned layer at `level`
    pub fn last_spawned(&self, level: usize) -> Option<Uuid> {
        self.calls().into_iter().rev().find_map(|call| match call {
            Call::Spawn {
                layer_id,
                level: spawned,
                ..
            } if spawned == level => Some(layer_id),
            _ => None,
        })
    }

    /// Alpha values set on one layer, in order
    pub fn alphas(&self, layer_id: Uuid) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Alpha {
                    layer_id: id, alpha, ..
                } if id == layer_id => Some(alpha),
                _ => None,
            })
            .collect()
    }

    /// Simulate the layer process ending on its own
    ///
    /// Returns false if the layer is unknown or was already stopped.
    pub fn end_layer(&self, layer_id: Uuid, exit_code: Option<i32>) -> bool {
        let entry = self.state.lock().unwrap().exit_senders.remove(&layer_id);
        match entry {
            Some((level, exit_tx)) => exit_tx
                .send(LayerExit {
                    layer_id,
                    level,
                    exit_code,
                })
                .is_ok(),
            None => false,
        }
    }
}

impl ProcessSupervisor for MockSupervisor {
    type Process = MockProcess;

    fn alpha_control(&self) -> bool {
        self.alpha_control
    }

    async fn spawn(&self, request: SpawnRequest, exit_tx: ExitSender) -> Result<MockProcess> {
        let mut state = self.state.lock().unwrap();
        if state.failing_levels.contains(&request.level) {
            return Err(Error::ProcessSpawn(format!(
                "injected failure for level {}",
                request.level
            )));
        }

        state.calls.push(Call::Spawn {
            layer_id: request.layer_id,
            level: request.level,
            looping: request.looping,
            alpha: request.alpha,
        });
        state
            .exit_senders
            .insert(request.layer_id, (request.level, exit_tx));

        Ok(MockProcess {
            layer_id: request.layer_id,
            level: request.level,
            alpha_control: self.alpha_control,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockProcess {
    layer_id: Uuid,
    level: usize,
    alpha_control: bool,
    state: Arc<Mutex<MockState>>,
}

impl LayerProcess for MockProcess {
    fn layer_id(&self) -> Uuid {
        self.layer_id
    }

    fn level(&self) -> usize {
        self.level
    }

    fn supports_alpha(&self) -> bool {
        self.alpha_control
    }

    async fn set_alpha(&self, alpha: u8) -> Result<()> {
        self.state.lock().unwrap().calls.push(Call::Alpha {
            layer_id: self.layer_id,
            level: self.level,
            alpha,
        });
        Ok(())
    }

    async fn stop(self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.exit_senders.remove(&self.layer_id);
        state.calls.push(Call::Stop {
            layer_id: self.layer_id,
            level: self.level,
        });
        Ok(())
    }
}

/// Levels 0..=n without fades
pub fn levels(n: usize) -> BTreeMap<usize, LevelConfig> {
    levels_with_fades(n, 0.0, 0.0)
}

/// Levels 0..=n; foreground levels use the given fades (seconds)
pub fn levels_with_fades(n: usize, fadein: f64, fadeout: f64) -> BTreeMap<usize, LevelConfig> {
    (0..=n)
        .map(|level| {
            let (fadein, fadeout) = if level == 0 { (0.0, 0.0) } else { (fadein, fadeout) };
            (
                level,
                LevelConfig {
                    folder: PathBuf::from(format!("/media/{}", level)),
                    fadein,
                    fadeout,
                    fade_curve: FadeCurve::Linear,
                },
            )
        })
        .collect()
}

/// One clip per level 0..=n
pub fn media(n: usize) -> MediaLibrary {
    MediaLibrary::new(
        (0..=n)
            .map(|level| (level, vec![PathBuf::from(format!("/media/{}/clip{}.mp4", level, level))]))
            .collect(),
    )
}

/// Wait (bounded) for the state watch to satisfy `predicate`
pub async fn wait_for_state(
    rx: &mut watch::Receiver<PlayerState>,
    predicate: impl FnMut(&PlayerState) -> bool,
) -> PlayerState {
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for player state")
        .expect("player state channel closed");
    *state
}
