//! External playback process abstraction
//!
//! The player manager never touches an OS process directly. It asks a
//! [`ProcessSupervisor`] to spawn a layer and drives the returned
//! [`LayerProcess`]. Natural process exits are reported as [`LayerExit`]
//! messages on a channel owned by the manager.

use crate::error::Result;
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Everything needed to start one layer
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRequest {
    /// Unique per spawn; echoed back in [`LayerExit`]
    pub layer_id: Uuid,
    /// Play level, also used as the display layer number
    pub level: usize,
    /// Resolved media file
    pub source: PathBuf,
    /// Restart the media when it ends (base layer)
    pub looping: bool,
    /// Initial layer alpha
    pub alpha: u8,
}

/// A layer process ended without being asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerExit {
    pub layer_id: Uuid,
    pub level: usize,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

/// Sender half handed to the supervisor on every spawn
pub type ExitSender = mpsc::UnboundedSender<LayerExit>;

/// A running layer
pub trait LayerProcess: Send + Sync + 'static {
    fn layer_id(&self) -> Uuid;

    fn level(&self) -> usize;

    /// Whether [`LayerProcess::set_alpha`] has any effect
    ///
    /// Fades are skipped for processes that cannot change alpha at runtime.
    fn supports_alpha(&self) -> bool;

    fn set_alpha(&self, alpha: u8) -> impl Future<Output = Result<()>> + Send;

    /// Stop the process and wait for it to be gone
    ///
    /// An explicit stop never produces a [`LayerExit`].
    fn stop(self) -> impl Future<Output = Result<()>> + Send;
}

/// Capability to start layer processes
pub trait ProcessSupervisor: Send + Sync + 'static {
    type Process: LayerProcess;

    /// Whether spawned processes can change alpha at runtime
    ///
    /// Decides the initial alpha of faded layers.
    fn alpha_control(&self) -> bool;

    /// Start a layer; resolves once the process is confirmed running
    ///
    /// `exit_tx` receives a [`LayerExit`] if the process later ends on its own.
    fn spawn(
        &self,
        request: SpawnRequest,
        exit_tx: ExitSender,
    ) -> impl Future<Output = Result<Self::Process>> + Send;
}
