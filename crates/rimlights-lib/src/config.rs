//! Application configuration: TOML file, platform-aware lookup.
//!
//! Top-level scalar keys deserialize into [`Config`]. The whole document is
//! also kept as a raw table so the LED groups can be walked with
//! [`Clause`](crate::settings::Clause) and their value descriptors inherited.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::SessionGate;
use crate::error::{Result, RimlightsError};
use crate::frame::LedGroup;
use crate::indicator::{self, Indicator};
use crate::protocol::{
    DEFAULT_BATCH_DELAY_MS, DEFAULT_BAUD_RATE, DEFAULT_BUTTON_COUNT, DEFAULT_RESPONSE_TIMEOUT_MS,
    DEFAULT_RETRIES, MASK_BITS,
};
use crate::settings::Clause;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "rimlights.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Shared-memory file the simulator plugin writes telemetry to.
    pub telemetry_file: PathBuf,

    /// Size of the telemetry buffer in bytes. Every binding must fit inside it.
    pub telemetry_size: usize,

    /// Delay between update cycles, in milliseconds. Default: 20.
    #[serde(default = "default_cycle_ms")]
    pub cycle_ms: u64,

    /// Explicit serial device. Empty = search `/dev/serial/by-id`.
    #[serde(default)]
    pub serial_device: Option<String>,

    /// Substring identifying the wheel base in `/dev/serial/by-id`. Default: "Base".
    #[serde(default = "default_device_match")]
    pub device_match: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// How long to wait for a query reply, in milliseconds. Default: 200.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,

    /// Resends allowed after a corrupted reply. Default: 2.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Pause between a color batch and its mask frame, in milliseconds. Default: 1.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Number of backlit buttons on the rim. Default: 14.
    #[serde(default = "default_button_count")]
    pub button_count: u8,

    #[serde(skip)]
    tree: toml::Table,
}

fn default_cycle_ms() -> u64 {
    20
}
fn default_device_match() -> String {
    "Base".into()
}
fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}
fn default_response_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT_MS
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_batch_delay_ms() -> u64 {
    DEFAULT_BATCH_DELAY_MS
}
fn default_button_count() -> u8 {
    DEFAULT_BUTTON_COUNT
}

impl Config {
    /// Platform-specific config directory.
    pub fn dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rimlights"))
    }

    /// Full path to the per-user config file.
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|d| d.join("config.toml"))
    }

    /// Locate the config file: `custom` if given, else `./rimlights.toml`,
    /// else the per-user file. Only existing files are returned, except for
    /// `custom`, whose absence is reported when loading.
    pub fn find(custom: Option<&Path>) -> Option<PathBuf> {
        if let Some(p) = custom {
            return Some(p.to_path_buf());
        }
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.is_file() {
            return Some(local);
        }
        Self::path().filter(|p| p.is_file())
    }

    /// Find and load the config file.
    pub fn load(custom: Option<&Path>) -> Result<Self> {
        let path = Self::find(custom).ok_or_else(|| {
            let user = Self::path()
                .map(|p| format!(" or {}", p.display()))
                .unwrap_or_default();
            RimlightsError::Config(format!("no config file found (tried ./{LOCAL_CONFIG}{user})"))
        })?;
        log::info!("loading config from {}", path.display());
        Self::load_from(&path)
    }

    /// Load and validate the config file at `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RimlightsError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            ))
        })?;
        Self::parse(&contents)
            .map_err(|e| RimlightsError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse and validate config text. Errors are returned as plain messages.
    fn parse(contents: &str) -> std::result::Result<Self, String> {
        let tree: toml::Table = toml::from_str(contents).map_err(|e| e.to_string())?;
        let mut config: Config = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.tree = tree;
        config.validate()?;
        Ok(config)
    }

    /// Check top-level values.
    fn validate(&self) -> std::result::Result<(), String> {
        if self.telemetry_size == 0 {
            return Err("telemetry_size must be greater than 0".into());
        }
        if self.cycle_ms == 0 {
            return Err("cycle_ms must be greater than 0".into());
        }
        if self.button_count == 0 || self.button_count as usize > MASK_BITS {
            return Err(format!(
                "button_count {} outside 1..={MASK_BITS}",
                self.button_count
            ));
        }
        if self.device_match.trim().is_empty() && self.serial_device.is_none() {
            return Err("device_match must not be empty".into());
        }
        Ok(())
    }

    /// Build the indicators configured for `group`.
    ///
    /// Button indicators must address one of the `button_count` buttons.
    pub fn indicators(&self, group: LedGroup) -> Result<Vec<Indicator>> {
        let root = Clause::root(&self.tree);
        let indicators = indicator::build_group(&root, group.name(), self.telemetry_size)?;
        if group == LedGroup::Buttons {
            if let Some(i) = indicators.iter().find(|i| i.position() >= self.button_count) {
                return Err(RimlightsError::Config(format!(
                    "{}.n: button {} outside 1..={}",
                    i.path(),
                    i.position() + 1,
                    self.button_count
                )));
            }
        }
        Ok(indicators)
    }

    /// Build the optional `[session]` gate.
    pub fn session_gate(&self) -> Result<SessionGate> {
        let root = Clause::root(&self.tree);
        SessionGate::from_clause(&root, self.telemetry_size)
    }

    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

impl std::str::FromStr for Config {
    type Err = RimlightsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).map_err(RimlightsError::Config)
    }
}
