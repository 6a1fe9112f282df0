//! Tracing subscriber setup with a runtime-adjustable filter
//!
//! Filter precedence: `RUST_LOG`, then the `[logging]` settings section.

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};
use vela_common::config::LoggingConfig;

/// Reload handle for a filter installed directly on the registry
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Pick the initial filter directive
pub fn initial_directive(rust_log: Option<String>, config: &LoggingConfig) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive,
        _ => config.filter_directive(),
    }
}

/// Install the global subscriber
///
/// # Errors
///
/// Fails if the directive is invalid or a global subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<LogControl> {
    let directive = initial_directive(std::env::var("RUST_LOG").ok(), config);
    let filter = parse_filter(&directive)?;
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install log subscriber: {}", e)))?;

    Ok(LogControl::new(handle, directive))
}

fn parse_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| Error::Config(format!("Invalid log filter {:?}: {}", directive, e)))
}

/// Swap the active log filter at runtime
#[derive(Clone)]
pub struct LogControl {
    handle: FilterHandle,
    current: Arc<Mutex<String>>,
}

impl LogControl {
    pub fn new(handle: FilterHandle, directive: impl Into<String>) -> Self {
        Self {
            handle,
            current: Arc::new(Mutex::new(directive.into())),
        }
    }

    /// Active filter directive
    pub fn current(&self) -> String {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the filter
    ///
    /// An invalid directive leaves the current filter in place.
    pub fn set_filter(&self, directive: &str) -> Result<()> {
        let filter = parse_filter(directive)?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::Config(format!("Failed to reload log filter: {}", e)))?;

        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = directive.to_string();
        info!("Log filter set to {:?}", directive);
        Ok(())
    }
}
