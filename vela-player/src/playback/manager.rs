//! Player manager
//!
//! Owns the base layer (level 0, looping) and at most one foreground layer.
//! All layer lifecycle goes through here; nothing else spawns or stops a
//! layer process.
//!
//! # Transition order
//!
//! `request_level(n)` spawns the new foreground layer first, fades it in,
//! fades the previous foreground out and only then stops it. A command is
//! fully resolved before the next one is taken, so at most two foreground
//! layers exist and only during the overlap.
//!
//! # Concurrency
//!
//! [`PlayerManager::spawn`] moves the manager into a task that serializes
//! commands from [`PlayerHandle`], `PlayLevelChange` events from the bus and
//! layer exit notifications.

use super::fader::Fader;
use super::media::MediaLibrary;
use super::process::{ExitSender, LayerExit, LayerProcess, ProcessSupervisor, SpawnRequest};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use vela_common::config::LevelConfig;
use vela_common::events::{EventBus, PlayerState, VelaEvent};
use vela_common::fade_curves::{ALPHA_OPAQUE, ALPHA_TRANSPARENT};

/// Command queue depth for [`PlayerHandle`]
const COMMAND_CAPACITY: usize = 32;

/// What a level request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOutcome {
    /// Below the current level; explicit downgrades are not allowed
    Ignored,
    /// Already at that level
    Unchanged,
    /// Foreground layer replaced
    Changed { from: usize, to: usize },
}

/// Base plus foreground layer orchestration
pub struct PlayerManager<S: ProcessSupervisor> {
    supervisor: S,
    media: MediaLibrary,
    levels: BTreeMap<usize, LevelConfig>,
    bus: EventBus,
    state_tx: watch::Sender<PlayerState>,
    exit_tx: ExitSender,
    exit_rx: mpsc::UnboundedReceiver<LayerExit>,
    base: Option<S::Process>,
    foreground: Option<S::Process>,
    current_level: usize,
}

impl<S: ProcessSupervisor> PlayerManager<S> {
    pub fn new(
        supervisor: S,
        media: MediaLibrary,
        levels: BTreeMap<usize, LevelConfig>,
        bus: EventBus,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlayerState::Stopped);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            supervisor,
            media,
            levels,
            bus,
            state_tx,
            exit_tx,
            exit_rx,
            base: None,
            foreground: None,
            current_level: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state_tx.subscribe()
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    /// Layer id of the current foreground process
    pub fn foreground_layer(&self) -> Option<Uuid> {
        self.foreground.as_ref().map(LayerProcess::layer_id)
    }

    pub fn base_layer(&self) -> Option<Uuid> {
        self.base.as_ref().map(LayerProcess::layer_id)
    }

    /// Highest configured level
    pub fn max_level(&self) -> usize {
        self.levels.keys().next_back().copied().unwrap_or(0)
    }

    /// Spawn the base layer
    ///
    /// # Errors
    ///
    /// - `NoMediaForLevel(0)` if the base pool is empty
    /// - `ProcessSpawn` if the process does not start; the manager stays stopped
    /// - `InvalidState` if already started
    pub async fn start(&mut self) -> Result<()> {
        if self.state() != PlayerState::Stopped {
            return Err(Error::InvalidState(format!("cannot start while {}", self.state())));
        }

        let source = self.media.pick(0).ok_or(Error::NoMediaForLevel(0))?;
        let request = SpawnRequest {
            layer_id: Uuid::new_v4(),
            level: 0,
            source,
            looping: true,
            alpha: ALPHA_OPAQUE,
        };

        info!(layer_id = %request.layer_id, "starting base layer {:?}", request.source);
        let base = self.supervisor.spawn(request, self.exit_tx.clone()).await?;
        self.base = Some(base);
        self.current_level = 0;
        self.set_state(PlayerState::Idle);
        Ok(())
    }

    /// Move to level `n`
    ///
    /// Lower levels are ignored and the current level is left alone. On
    /// failure nothing changes and the previous foreground layer keeps
    /// playing.
    pub async fn request_level(&mut self, n: usize) -> Result<LevelOutcome> {
        if self.state() == PlayerState::Stopped {
            return Err(Error::InvalidState("player is stopped".to_string()));
        }

        if n < self.current_level {
            debug!(level = n, current = self.current_level, "lower level ignored");
            return Ok(LevelOutcome::Ignored);
        }
        if n == self.current_level {
            debug!(level = n, "already at level");
            return Ok(LevelOutcome::Unchanged);
        }

        let level_config = self.levels.get(&n).cloned().ok_or(Error::InvalidLevel {
            level: n,
            max: self.max_level(),
        })?;
        let source = self.media.pick(n).ok_or(Error::NoMediaForLevel(n))?;

        let fade_in = Fader::fade_in_for(&level_config);
        let faded = self.supervisor.alpha_control() && !fade_in.is_instant();
        let request = SpawnRequest {
            layer_id: Uuid::new_v4(),
            level: n,
            source,
            looping: false,
            alpha: if faded { ALPHA_TRANSPARENT } else { ALPHA_OPAQUE },
        };

        let from = self.current_level;
        info!(level = n, from, layer_id = %request.layer_id, "spawning foreground {:?}", request.source);

        let new_layer = match self.supervisor.spawn(request, self.exit_tx.clone()).await {
            Ok(process) => process,
            Err(e) => {
                error!(level = n, "foreground spawn failed: {}", e);
                return Err(e);
            }
        };

        self.set_state(PlayerState::Transitioning { from, to: n });

        if faded {
            if let Err(e) = fade_in.fade_in(&new_layer).await {
                warn!(level = n, "fade in failed: {}", e);
            }
        }

        if let Some(old_layer) = self.foreground.take() {
            self.retire(old_layer).await;
        }

        self.foreground = Some(new_layer);
        self.current_level = n;
        self.set_state(PlayerState::Playing { level: n });
        Ok(LevelOutcome::Changed { from, to: n })
    }

    /// Handle a layer process that ended on its own
    ///
    /// Returns `true` when the current foreground layer ended and the manager
    /// went back to idle. Exits of layers that were already replaced are
    /// ignored.
    pub fn on_layer_ended(&mut self, exit: LayerExit) -> bool {
        if self.foreground_layer() == Some(exit.layer_id) {
            info!(level = exit.level, exit_code = ?exit.exit_code, "foreground layer ended");
            self.foreground = None;
            self.current_level = 0;
            self.set_state(PlayerState::Idle);
            return true;
        }

        if self.base_layer() == Some(exit.layer_id) {
            error!(exit_code = ?exit.exit_code, "base layer ended unexpectedly");
            self.base = None;
            return false;
        }

        debug!(layer_id = %exit.layer_id, level = exit.level, "exit of replaced layer ignored");
        false
    }

    /// Stop the foreground layer, then the base layer
    ///
    /// Stop failures are logged; the manager always ends up stopped.
    pub async fn stop(&mut self) {
        if let Some(foreground) = self.foreground.take() {
            info!(level = self.current_level, "stopping foreground layer");
            if let Err(e) = foreground.stop().await {
                warn!("foreground stop failed: {}", e);
            }
        }

        if let Some(base) = self.base.take() {
            info!("stopping base layer");
            if let Err(e) = base.stop().await {
                warn!("base stop failed: {}", e);
            }
        }

        self.current_level = 0;
        self.set_state(PlayerState::Stopped);
    }

    /// Fade out and stop a replaced foreground layer
    async fn retire(&self, layer: S::Process) {
        let level = layer.level();
        if let Some(config) = self.levels.get(&level) {
            let fade_out = Fader::fade_out_for(config);
            if !fade_out.is_instant() {
                if let Err(e) = fade_out.fade_out(&layer).await {
                    warn!(level, "fade out failed: {}", e);
                }
            }
        }

        info!(level, layer_id = %layer.layer_id(), "stopping replaced layer");
        if let Err(e) = layer.stop().await {
            warn!(level, "stop of replaced layer failed: {}", e);
        }
    }

    fn set_state(&self, new_state: PlayerState) {
        let old_state = self.state_tx.send_replace(new_state);
        if old_state == new_state {
            return;
        }

        info!("player state: {} -> {}", old_state, new_state);
        self.bus.emit_lossy(VelaEvent::PlayerStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Move into a task that serves commands until stopped
    ///
    /// The manager listens to `PlayLevelChange` events on its bus from this
    /// point on.
    pub fn spawn(self) -> PlayerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (done_tx, done_rx) = watch::channel(false);
        let state_rx = self.subscribe_state();
        let bus_rx = self.bus.subscribe();

        tokio::spawn(self.run(commands_rx, bus_rx, done_tx));

        PlayerHandle {
            commands: commands_tx,
            state: state_rx,
            done: done_rx,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut bus_rx: broadcast::Receiver<VelaEvent>,
        done_tx: watch::Sender<bool>,
    ) {
        info!("player manager running");

        loop {
            // Pending exits resolve before any later request is evaluated
            tokio::select! {
                biased;

                Some(exit) = self.exit_rx.recv() => {
                    self.on_layer_ended(exit);
                }
                command = commands.recv() => match command {
                    Some(Command::RequestLevel { level, reply }) => {
                        let result = self.request_level(level).await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Stop { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("all player handles dropped");
                        self.stop().await;
                        break;
                    }
                },
                event = bus_rx.recv() => match event {
                    Ok(VelaEvent::PlayLevelChange { level, comment }) => {
                        info!(level, %comment, "level change requested");
                        if let Err(e) = self.request_level(level).await {
                            error!(level, "level change failed: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("player manager lagged, {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        self.stop().await;
                        break;
                    }
                },
            }
        }

        info!("player manager done");
        done_tx.send_replace(true);
    }
}

enum Command {
    RequestLevel {
        level: usize,
        reply: oneshot::Sender<Result<LevelOutcome>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Control handle for a spawned [`PlayerManager`]
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<PlayerState>,
    done: watch::Receiver<bool>,
}

impl PlayerHandle {
    /// Ask for level `level` and wait until the request is resolved
    pub async fn request_level(&self, level: usize) -> Result<LevelOutcome> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::RequestLevel { level, reply })
            .await
            .map_err(|_| Error::InvalidState("player manager has shut down".to_string()))?;
        rx.await
            .map_err(|_| Error::InvalidState("player manager has shut down".to_string()))?
    }

    /// Stop all layers and wait for the manager to finish
    ///
    /// Safe to call more than once.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
        self.done().await;
    }

    pub fn state(&self) -> PlayerState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlayerState> {
        self.state.clone()
    }

    /// Resolves once, after full shutdown
    pub async fn done(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }
}
