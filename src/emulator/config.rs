// Configuration management
//
// Host settings persisted as TOML: pacing, audio, persistence, video,
// core module locations and logging.

use crate::console::Console;
use crate::logger::LogLevel;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path
pub const CONFIG_FILE: &str = "emu_host.toml";

/// Host configuration
///
/// Stores all user-configurable settings for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Pacing settings
    pub pacing: PacingConfig,

    /// Audio settings
    pub audio: AudioConfig,

    /// Auto-save and thumbnail settings
    pub persistence: PersistenceSettings,

    /// Video settings
    pub video: VideoConfig,

    /// Core module locations
    pub cores: CoresConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Pacing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Longest frame delta turned into emulated time, in milliseconds
    pub max_frame_delta_ms: u64,
}

/// Audio configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Enable audio
    pub enabled: bool,

    /// Output sample rate
    pub sample_rate: u32,

    /// Lead added when the schedule falls behind the output clock
    pub safety_margin_ms: u64,

    /// Resume a suspended output on key presses
    pub resume_on_input: bool,

    /// Most audio held ahead of the output clock
    pub max_queue_ms: u64,
}

/// Persistence configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Auto-save period
    pub autosave_interval_ms: u64,

    /// Delay before the thumbnail capture
    pub capture_delay_ms: u64,

    /// Take a thumbnail after `capture_delay_ms`
    pub capture_image: bool,

    /// Slot auto-saves go to; unset disables auto-save
    pub save_slot: Option<u32>,

    /// Root of the save storage
    pub storage_directory: PathBuf,
}

/// Video configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Window scale (1-8)
    pub scale: u32,

    /// Enable VSync
    pub vsync: bool,
}

/// Core module configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoresConfig {
    /// NES core module
    pub nes: PathBuf,

    /// CHIP-8 core module
    pub chip8: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level recorded
    pub level: LogLevel,

    /// Append log lines to this file
    pub file: Option<PathBuf>,

    /// Mirror log lines to stderr
    pub stderr: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            max_frame_delta_ms: 100,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig {
            enabled: true,
            sample_rate: crate::console::CORE_SAMPLE_RATE,
            safety_margin_ms: 100,
            resume_on_input: true,
            max_queue_ms: 500,
        }
    }
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        PersistenceSettings {
            autosave_interval_ms: 2000,
            capture_delay_ms: 10_000,
            capture_image: false,
            save_slot: Some(0),
            storage_directory: PathBuf::from("saves"),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            scale: 3,
            vsync: true,
        }
    }
}

impl Default for CoresConfig {
    fn default() -> Self {
        CoresConfig {
            nes: PathBuf::from("cores/nes.wasm"),
            chip8: PathBuf::from("cores/chip8.wasm"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            file: None,
            stderr: true,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            pacing: PacingConfig::default(),
            audio: AudioConfig::default(),
            persistence: PersistenceSettings::default(),
            video: VideoConfig::default(),
            cores: CoresConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PacingConfig {
    pub fn max_frame_delta(&self) -> Duration {
        Duration::from_millis(self.max_frame_delta_ms)
    }
}

impl AudioConfig {
    pub fn safety_margin(&self) -> f64 {
        self.safety_margin_ms as f64 / 1000.0
    }
}

impl PersistenceSettings {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_millis(self.autosave_interval_ms)
    }

    pub fn capture_delay(&self) -> Duration {
        Duration::from_millis(self.capture_delay_ms)
    }
}

impl CoresConfig {
    /// Core module path for a console
    pub fn path_for(&self, console: Console) -> &Path {
        match console {
            Console::Nes => &self.nes,
            Console::Chip8 => &self.chip8,
        }
    }
}

impl HostConfig {
    /// Load configuration from file or create default
    ///
    /// If the configuration file doesn't exist or can't be parsed, a default
    /// configuration is returned and written to the file when none existed.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use emu_host::emulator::HostConfig;
    ///
    /// let config = HostConfig::load_or_default("emu_host.toml");
    /// ```
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                let config = Self::default();
                if e.kind() == io::ErrorKind::NotFound {
                    // Try to save the default config, but don't fail if we can't
                    let _ = config.save(path);
                } else {
                    eprintln!("Ignoring {}: {}", path.display(), e);
                }
                config
            }
        }
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, io::Error> {
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), io::Error> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }
}
