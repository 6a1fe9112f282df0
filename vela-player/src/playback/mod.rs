//! Layered playback: media pools, layer processes and their orchestration

pub mod fader;
pub mod manager;
pub mod media;
pub mod omxplayer;
pub mod process;

pub use fader::Fader;
pub use manager::{LevelOutcome, PlayerHandle, PlayerManager};
pub use media::MediaLibrary;
pub use omxplayer::{OmxConfig, OmxProcess, OmxSupervisor};
pub use process::{ExitSender, LayerExit, LayerProcess, ProcessSupervisor, SpawnRequest};
