//! TCP line input
//!
//! Accepts any number of connections; every received line is trimmed and
//! parsed as a number. Depending on the configured mode it becomes a
//! `Reading` (source "network") or a direct `PlayLevelChange`. Lines that do
//! not parse are logged and dropped.

use crate::error::{Error, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use vela_common::config::{NetworkInputConfig, NetworkInputMode};
use vela_common::events::{EventBus, VelaEvent};

/// Source name carried by events from this input
pub const SOURCE: &str = "network";

/// Turn one received line into a bus event
pub fn parse_line(line: &str, mode: NetworkInputMode) -> Option<VelaEvent> {
    let text = line.trim();
    match mode {
        NetworkInputMode::Readings => {
            let value: f64 = text.parse().ok()?;
            value.is_finite().then(|| VelaEvent::Reading {
                source: SOURCE.to_string(),
                value,
            })
        }
        NetworkInputMode::Levels => text.parse().ok().map(|level| VelaEvent::PlayLevelChange {
            level,
            comment: SOURCE.to_string(),
        }),
    }
}

pub struct NetworkInput {
    config: NetworkInputConfig,
    bus: EventBus,
}

impl NetworkInput {
    pub fn new(config: NetworkInputConfig, bus: EventBus) -> Self {
        Self { config, bus }
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.interface, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind network input to {}: {}", addr, e)))?;
        info!("Network input listening on {} ({:?} mode)", addr, self.config.mode);
        Ok(listener)
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bus = self.bus.clone();
                    let mode = self.config.mode;
                    tokio::spawn(async move {
                        read_lines(stream, peer, mode, bus).await;
                    });
                }
                Err(e) => warn!("Network input accept failed: {}", e),
            }
        }
    }
}

async fn read_lines<R>(reader: R, peer: SocketAddr, mode: NetworkInputMode, bus: EventBus)
where
    R: AsyncRead + Unpin,
{
    info!(%peer, "connection made");
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                debug!(%peer, "received {:?}", line);
                match parse_line(&line, mode) {
                    Some(event) => bus.emit_lossy(event),
                    None => warn!(%peer, "ignoring unparseable line {:?}", line),
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, "read failed: {}", e);
                break;
            }
        }
    }
    info!(%peer, "connection lost");
}
