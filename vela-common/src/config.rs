//! Settings loading and settings file resolution
//!
//! Settings live in a single TOML file. Resolution priority:
//! 1. Command-line argument / `VELA_CONFIG` (handled by the binary's clap args)
//! 2. User config: `~/.config/vela/settings.toml`
//! 3. System config: `/etc/vela/settings.toml`
//!
//! Relative level folders are resolved against the directory holding the
//! settings file.

use crate::fade_curves::FadeCurve;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Settings file name looked up in the config directories
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

/// Longest accepted fade-in or fade-out, in seconds
pub const MAX_FADE_SECONDS: f64 = 600.0;

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Per-target overrides, e.g. `"vela_player::playback" = "debug"`
    #[serde(default)]
    pub targets: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            targets: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Render as an `EnvFilter` directive string: `info,target=debug,...`
    pub fn filter_directive(&self) -> String {
        let mut directive = self.level.clone();
        for (target, level) in &self.targets {
            directive.push(',');
            directive.push_str(target);
            directive.push('=');
            directive.push_str(level);
        }
        directive
    }
}

/// External playback engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    /// Playback engine executable (e.g. omxplayer.bin)
    pub player_bin: PathBuf,

    /// Prepended to LD_LIBRARY_PATH for spawned players (empty = untouched)
    #[serde(default)]
    pub ld_library_path: String,

    /// Extra arguments passed before the media file
    #[serde(default = "default_player_args")]
    pub player_args: Vec<String>,

    /// Optional control helper: `<control_bin> <player-name> setalpha <value>`
    ///
    /// Without it layers spawn fully opaque and fades are skipped.
    #[serde(default)]
    pub control_bin: Option<PathBuf>,

    /// How long a graceful stop may take before the process is killed
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl EnvironmentConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

/// Aggregated derivative processor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgdConfig {
    /// Number of readings kept for the aggregation
    pub buffer_size: usize,

    /// Thresholds for levels 1..N, in level order
    pub thresholds: Vec<f64>,

    /// Input whose readings drive the processor
    #[serde(default = "default_agd_source")]
    pub source: String,
}

/// How lines received by the network input are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkInputMode {
    /// Each line is a sensor reading fed to the AGD processor
    #[default]
    Readings,
    /// Each line is a play level requested directly
    Levels,
}

/// TCP line input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkInputConfig {
    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_network_port")]
    pub port: u16,

    #[serde(default)]
    pub mode: NetworkInputMode,
}

impl Default for NetworkInputConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            port: default_network_port(),
            mode: NetworkInputMode::default(),
        }
    }
}

/// Input configuration; absent inputs are not started
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputsConfig {
    #[serde(default)]
    pub network: Option<NetworkInputConfig>,
}

/// HTTP control API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_interface")]
    pub interface: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interface: default_interface(),
            port: default_api_port(),
        }
    }
}

/// Per-level media folder and fade timings
#[derive(Debug, Clone, Deserialize)]
pub struct LevelConfig {
    /// Folder holding the candidate media files for the level
    pub folder: PathBuf,

    /// Fade-in duration in seconds
    #[serde(default)]
    pub fadein: f64,

    /// Fade-out duration in seconds
    #[serde(default)]
    pub fadeout: f64,

    #[serde(default)]
    pub fade_curve: FadeCurve,
}

impl LevelConfig {
    pub fn fade_in(&self) -> Duration {
        fade_duration(self.fadein)
    }

    pub fn fade_out(&self) -> Duration {
        fade_duration(self.fadeout)
    }
}

/// Clamped to 0..=MAX_FADE_SECONDS; NaN maps to zero
fn fade_duration(seconds: f64) -> Duration {
    Duration::from_secs_f64(seconds.max(0.0).min(MAX_FADE_SECONDS))
}

/// Settings file layout as written on disk
#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    logging: LoggingConfig,
    environment: EnvironmentConfig,
    agd: AgdConfig,
    #[serde(default)]
    inputs: InputsConfig,
    #[serde(default)]
    api: ApiConfig,
    /// TOML table keys are strings; converted to level numbers on load
    levels: BTreeMap<String, LevelConfig>,
}

/// Complete, validated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
    pub agd: AgdConfig,
    pub inputs: InputsConfig,
    pub api: ApiConfig,
    /// Level 0 (base) plus foreground levels 1..N
    pub levels: BTreeMap<usize, LevelConfig>,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file cannot be read or parsed
    /// - A level key is not a number
    /// - Validation fails (see [`Settings::validate`])
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read settings file {:?}: {}", path, e))
        })?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let settings = Self::from_toml_str(&content, &base_dir)?;
        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Parse settings from TOML text, resolving relative folders against `base_dir`
    pub fn from_toml_str(content: &str, base_dir: &Path) -> Result<Self> {
        let file: SettingsFile = toml::from_str(content)?;

        let mut levels = BTreeMap::new();
        for (key, mut level_config) in file.levels {
            let level: usize = key
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid level key: {:?}", key)))?;

            if level_config.folder.is_relative() {
                level_config.folder = base_dir.join(&level_config.folder);
            }
            debug!("Level {} folder: {:?}", level, level_config.folder);
            levels.insert(level, level_config);
        }

        let settings = Self {
            logging: file.logging,
            environment: file.environment,
            agd: file.agd,
            inputs: file.inputs,
            api: file.api,
            levels,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check cross-section consistency
    ///
    /// - Level 0 must be configured
    /// - Levels must be contiguous from 0
    /// - One AGD threshold per foreground level
    /// - AGD buffer must hold at least two readings
    /// - Fade durations must lie within 0..=MAX_FADE_SECONDS
    pub fn validate(&self) -> Result<()> {
        if !self.levels.contains_key(&0) {
            return Err(Error::Config("Level 0 (base layer) is not configured".to_string()));
        }

        for (expected, level) in self.levels.keys().enumerate() {
            if *level != expected {
                return Err(Error::Config(format!(
                    "Levels must be contiguous from 0: missing level {}",
                    expected
                )));
            }
        }

        let foreground = self.foreground_levels();
        if self.agd.thresholds.len() != foreground {
            return Err(Error::Config(format!(
                "Expected {} AGD thresholds (one per foreground level), found {}",
                foreground,
                self.agd.thresholds.len()
            )));
        }

        if self.agd.buffer_size < 2 {
            return Err(Error::Config(format!(
                "AGD buffer_size must be at least 2, found {}",
                self.agd.buffer_size
            )));
        }

        for (level, level_config) in &self.levels {
            for (name, value) in [("fadein", level_config.fadein), ("fadeout", level_config.fadeout)] {
                if !(0.0..=MAX_FADE_SECONDS).contains(&value) {
                    return Err(Error::Config(format!(
                        "Level {} {} must be between 0 and {} seconds, found {}",
                        level, name, MAX_FADE_SECONDS, value
                    )));
                }
            }
        }

        Ok(())
    }

    /// Number of foreground levels (N)
    pub fn foreground_levels(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// Resolve the settings file path
///
/// `cli_arg` carries the `--config` / `VELA_CONFIG` value when given; otherwise
/// the user and system config directories are tried in that order.
pub fn resolve_settings_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path.to_path_buf());
    }

    let candidates = [
        dirs::config_dir().map(|d| d.join("vela").join(SETTINGS_FILE_NAME)),
        Some(PathBuf::from("/etc/vela").join(SETTINGS_FILE_NAME)),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|path| path.exists())
        .ok_or_else(|| Error::Config("No settings file found".to_string()))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_player_args() -> Vec<String> {
    vec!["--no-osd".to_string()]
}

fn default_stop_timeout_ms() -> u64 {
    1000
}

fn default_agd_source() -> String {
    "network".to_string()
}

fn default_interface() -> String {
    "0.0.0.0".to_string()
}

fn default_network_port() -> u16 {
    10000
}

fn default_api_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directive() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.filter_directive(), "info");

        logging.level = "warn".to_string();
        logging.targets.insert("vela_player::playback".to_string(), "debug".to_string());
        assert_eq!(logging.filter_directive(), "warn,vela_player::playback=debug");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(default_network_port(), 10000);
        assert_eq!(default_api_port(), 8080);
        assert_eq!(default_stop_timeout_ms(), 1000);
        assert_eq!(default_agd_source(), "network");
    }

    #[test]
    fn test_cli_arg_takes_priority() {
        let path = resolve_settings_path(Some(Path::new("/tmp/custom.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));
    }

    #[test]
    fn test_network_mode_parsing() {
        let config: NetworkInputConfig = toml::from_str("mode = \"levels\"").unwrap();
        assert_eq!(config.mode, NetworkInputMode::Levels);
        assert_eq!(config.port, 10000);

        let config: NetworkInputConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.mode, NetworkInputMode::Readings);
    }

    #[test]
    fn test_level_fade_durations() {
        let level = LevelConfig {
            folder: PathBuf::from("/media/1"),
            fadein: 1.5,
            fadeout: 0.25,
            fade_curve: FadeCurve::Linear,
        };
        assert_eq!(level.fade_in(), Duration::from_millis(1500));
        assert_eq!(level.fade_out(), Duration::from_millis(250));
    }

    #[test]
    fn test_out_of_range_fades_are_clamped() {
        let level = LevelConfig {
            folder: PathBuf::from("/media/1"),
            fadein: 1e20,
            fadeout: f64::NAN,
            fade_curve: FadeCurve::Linear,
        };
        assert_eq!(level.fade_in(), Duration::from_secs(MAX_FADE_SECONDS as u64));
        assert_eq!(level.fade_out(), Duration::ZERO);
    }
}
