//! omxplayer process supervision
//!
//! Each layer is one `omxplayer.bin` child process. A monitor task owns the
//! child for its whole life: it forwards output to tracing, reports natural
//! exits and serves stop requests (`q` on stdin, then kill after a timeout).
//! Alpha changes go through an optional control helper invoked as
//! `<control_bin> <player-name> setalpha <alpha>`.

use super::process::{ExitSender, LayerExit, LayerProcess, ProcessSupervisor, SpawnRequest};
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vela_common::config::EnvironmentConfig;

/// Process supervision settings
#[derive(Debug, Clone)]
pub struct OmxConfig {
    pub player_bin: PathBuf,
    /// Prepended to the inherited LD_LIBRARY_PATH (empty = untouched)
    pub ld_library_path: String,
    /// Passed after the fixed arguments, before the media file
    pub player_args: Vec<String>,
    pub control_bin: Option<PathBuf>,
    pub stop_timeout: Duration,
}

impl From<&EnvironmentConfig> for OmxConfig {
    fn from(env: &EnvironmentConfig) -> Self {
        Self {
            player_bin: env.player_bin.clone(),
            ld_library_path: env.ld_library_path.clone(),
            player_args: env.player_args.clone(),
            control_bin: env.control_bin.clone(),
            stop_timeout: env.stop_timeout(),
        }
    }
}

/// Spawns omxplayer layers
pub struct OmxSupervisor {
    config: Arc<OmxConfig>,
    player_counter: AtomicUsize,
}

impl OmxSupervisor {
    pub fn new(config: OmxConfig) -> Self {
        info!("player executable is {:?}", config.player_bin);
        if config.control_bin.is_none() {
            info!("no alpha control helper configured, fades disabled");
        }
        Self {
            config: Arc::new(config),
            player_counter: AtomicUsize::new(0),
        }
    }

    /// Unique player name, usable as a D-Bus well-known name
    ///
    /// Format: `vela.p<file stem>-<nnn>`, counter wrapping at 1000.
    pub fn next_player_name(&self, source: &Path) -> String {
        let id = (self.player_counter.fetch_add(1, Ordering::Relaxed) + 1) % 1000;
        let stem: String = source
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        format!("vela.p{}-{:03}", stem, id)
    }

    /// Command line for one layer, excluding the executable
    pub fn command_args(&self, request: &SpawnRequest, player_name: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if request.looping {
            args.push("--loop".into());
        }
        args.push("--dbus_name".into());
        args.push(player_name.into());
        args.push("--layer".into());
        args.push(request.level.to_string().into());
        args.push("--alpha".into());
        args.push(request.alpha.to_string().into());
        args.extend(self.config.player_args.iter().map(OsString::from));
        args.push(request.source.clone().into_os_string());
        args
    }

    /// LD_LIBRARY_PATH for spawned players, `None` to inherit unchanged
    pub fn library_path(&self, inherited: Option<&str>) -> Option<String> {
        let extra = self.config.ld_library_path.as_str();
        if extra.is_empty() {
            return None;
        }
        match inherited {
            Some(current) if !current.is_empty() => Some(format!("{}:{}", extra, current)),
            _ => Some(extra.to_string()),
        }
    }
}

impl ProcessSupervisor for OmxSupervisor {
    type Process = OmxProcess;

    fn alpha_control(&self) -> bool {
        self.config.control_bin.is_some()
    }

    async fn spawn(&self, request: SpawnRequest, exit_tx: ExitSender) -> Result<OmxProcess> {
        let player_name = self.next_player_name(&request.source);
        let args = self.command_args(&request, &player_name);

        info!(
            layer_id = %request.layer_id,
            level = request.level,
            player = %player_name,
            "spawning {:?}",
            request.source
        );
        debug!("{:?} {:?}", self.config.player_bin, args);

        let mut command = Command::new(&self.config.player_bin);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let inherited = std::env::var("LD_LIBRARY_PATH").ok();
        if let Some(path) = self.library_path(inherited.as_deref()) {
            debug!("LD_LIBRARY_PATH set to {:?}", path);
            command.env("LD_LIBRARY_PATH", path);
        }

        let mut child = command.spawn().map_err(|e| {
            Error::ProcessSpawn(format!(
                "{:?} for {:?}: {}",
                self.config.player_bin, request.source, e
            ))
        })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(player_name.clone(), stdout, OutputStream::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(player_name.clone(), stderr, OutputStream::Stderr));
        }

        let stdin = child.stdin.take();
        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = Monitor {
            layer_id: request.layer_id,
            level: request.level,
            player_name: player_name.clone(),
            stop_timeout: self.config.stop_timeout,
        };
        tokio::spawn(monitor.run(child, stdin, stop_rx, exit_tx));

        info!(player = %player_name, "started");

        Ok(OmxProcess {
            layer_id: request.layer_id,
            level: request.level,
            player_name,
            control_bin: self.config.control_bin.clone(),
            stop_tx,
        })
    }
}

/// Handle to one running omxplayer layer
pub struct OmxProcess {
    layer_id: Uuid,
    level: usize,
    player_name: String,
    control_bin: Option<PathBuf>,
    /// Carries the completion sender for the stop
    stop_tx: oneshot::Sender<oneshot::Sender<()>>,
}

impl LayerProcess for OmxProcess {
    fn layer_id(&self) -> Uuid {
        self.layer_id
    }

    fn level(&self) -> usize {
        self.level
    }

    fn supports_alpha(&self) -> bool {
        self.control_bin.is_some()
    }

    async fn set_alpha(&self, alpha: u8) -> Result<()> {
        let Some(control_bin) = &self.control_bin else {
            return Ok(());
        };

        let output = Command::new(control_bin)
            .arg(&self.player_name)
            .arg("setalpha")
            .arg(alpha.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::ProcessControl(format!("{:?}: {}", control_bin, e)))?;

        if !output.status.success() {
            return Err(Error::ProcessControl(format!(
                "setalpha {} on {} failed ({}): {}",
                alpha,
                self.player_name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    async fn stop(self) -> Result<()> {
        info!(player = %self.player_name, "stopping");

        let (done_tx, done_rx) = oneshot::channel();
        if self.stop_tx.send(done_tx).is_err() {
            debug!(player = %self.player_name, "no process to stop");
            return Ok(());
        }

        done_rx.await.map_err(|_| {
            Error::ProcessControl(format!("{} monitor ended before stop completed", self.player_name))
        })?;

        info!(player = %self.player_name, "stopped");
        Ok(())
    }
}

struct Monitor {
    layer_id: Uuid,
    level: usize,
    player_name: String,
    stop_timeout: Duration,
}

impl Monitor {
    async fn run(
        self,
        mut child: Child,
        stdin: Option<ChildStdin>,
        stop_rx: oneshot::Receiver<oneshot::Sender<()>>,
        exit_tx: ExitSender,
    ) {
        tokio::select! {
            status = child.wait() => {
                let exit_code = match status {
                    Ok(status) => status.code(),
                    Err(e) => {
                        warn!(player = %self.player_name, "failed waiting for process: {}", e);
                        None
                    }
                };
                info!(player = %self.player_name, ?exit_code, "process ended");
                let _ = exit_tx.send(LayerExit {
                    layer_id: self.layer_id,
                    level: self.level,
                    exit_code,
                });
            }
            request = stop_rx => {
                self.stop_child(&mut child, stdin).await;
                // A dropped handle is a stop with nobody waiting
                if let Ok(done) = request {
                    let _ = done.send(());
                }
            }
        }
    }

    async fn stop_child(&self, child: &mut Child, stdin: Option<ChildStdin>) {
        if let Some(mut stdin) = stdin {
            debug!(player = %self.player_name, "requesting quit");
            if let Err(e) = stdin.write_all(b"q").await {
                debug!(player = %self.player_name, "quit request failed: {}", e);
            }
            let _ = stdin.flush().await;
        }

        match tokio::time::timeout(self.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(player = %self.player_name, exit_code = ?status.code(), "quit cleanly");
                return;
            }
            Ok(Err(e)) => warn!(player = %self.player_name, "failed waiting for process: {}", e),
            Err(_) => warn!(
                player = %self.player_name,
                "no quit after {:?}, killing",
                self.stop_timeout
            ),
        }

        if let Err(e) = child.kill().await {
            warn!(player = %self.player_name, "kill failed: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_output<R>(player_name: String, reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                OutputStream::Stdout => debug!(player = %player_name, "{}", line),
                OutputStream::Stderr => warn!(player = %player_name, "{}", line),
            },
            Ok(None) => break,
            Err(e) => {
                debug!(player = %player_name, ?stream, "output closed: {}", e);
                break;
            }
        }
    }
}
