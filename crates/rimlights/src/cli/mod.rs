//! CLI subcommands: run the LED loop, check config, probe the wheel, list ports.

mod check;
mod devices;
mod probe;
mod run;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::Serialize;

pub(super) use crate::RUNNING;
pub(super) use rimlights_lib::config::Config;
pub(super) use rimlights_lib::error::{Result, RimlightsError};
pub(super) use rimlights_lib::transport::{
    self, PortInfo, SERIAL_BY_ID_DIR, SerialPortChannel, Transport,
};

const PADDING: usize = 2;

/// Compute alignment width for a command's key-value output.
/// Ensures at least PADDING spaces after the longest key in either level,
/// with top-level and indent values aligned to the same column.
pub(super) fn kv_width(top: &[&str], indent: &[&str]) -> usize {
    let top_max = top.iter().map(|k| k.len()).max().unwrap_or(0);
    let indent_max = indent.iter().map(|k| k.len()).max().unwrap_or(0);
    let top_need = if top.is_empty() { 0 } else { top_max + PADDING };
    // Indent keys lose 2 chars of inner width to the "  " prefix
    let indent_need = if indent.is_empty() {
        0
    } else {
        indent_max + PADDING + 2
    };
    top_need.max(indent_need)
}

pub(super) fn kv(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("{key:<width$}{value}", width = w);
}

pub(super) fn kv_indent(key: &str, value: impl std::fmt::Display, w: usize) {
    println!("  {key:<width$}{value}", width = w - 2);
}

/// Pretty-print `value` as JSON on stdout.
pub(super) fn print_json(value: &impl Serialize) -> Result<()> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| RimlightsError::Io(e.into()))?;
    println!("{text}");
    Ok(())
}

/// Open the wheel's serial port as configured.
///
/// `serial_device` wins; otherwise the first `/dev/serial/by-id` entry
/// matching `device_match`.
pub(super) fn open_wheel(config: &Config) -> Result<SerialPortChannel> {
    let path = match &config.serial_device {
        Some(p) => PathBuf::from(p),
        None => transport::find_wheel_port(Path::new(SERIAL_BY_ID_DIR), &config.device_match)?,
    };
    let channel = SerialPortChannel::open(
        &path.to_string_lossy(),
        config.baud_rate,
        config.response_timeout(),
    )?;
    Ok(channel)
}

/// Wrap `channel` with the configured timeout and retry budget.
pub(super) fn transport_for<C: transport::SerialChannel>(
    config: &Config,
    channel: C,
) -> Transport<C> {
    Transport::with_settings(channel, config.response_timeout(), config.retries)
}

/// Options shared by every subcommand.
pub struct Options {
    pub config: Option<PathBuf>,
    pub json: bool,
}

impl Options {
    fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref())
    }
}

// ── JSON output structs ──

#[derive(Serialize)]
pub(super) struct DevicesOutput {
    pub count: usize,
    pub by_id: Vec<String>,
    pub ports: Vec<PortInfo>,
}

#[derive(Serialize)]
pub(super) struct IndicatorJson {
    pub n: u8,
    pub path: String,
    pub value: String,
    pub total: Option<String>,
    pub levels: Vec<f64>,
    pub percent: bool,
    pub inverted: Vec<bool>,
    pub colors: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct CheckOutput {
    pub config_file: Option<String>,
    pub telemetry_file: String,
    pub telemetry_size: usize,
    pub cycle_ms: u64,
    pub button_count: u8,
    pub session_gate: bool,
    pub rpm: Vec<IndicatorJson>,
    pub buttons: Vec<IndicatorJson>,
}

#[derive(Serialize)]
pub(super) struct ButtonColorJson {
    pub n: u8,
    pub color: String,
}

#[derive(Serialize)]
pub(super) struct ProbeOutput {
    pub port: String,
    pub rpm_mode: String,
    pub buttons: Vec<ButtonColorJson>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Drive the LEDs from telemetry until Ctrl+C
    Run {
        /// Don't touch the wheel; compute and log frames only
        #[arg(long)]
        no_wheel: bool,
    },

    /// Validate the config file and list the configured indicators
    Check,

    /// Read the wheel's current RPM mode and idle button colors
    Probe,

    /// List serial ports
    Devices,
}

/// Warn if `--json` was passed to a command that doesn't support it.
fn warn_json_unsupported(cmd_name: &str) {
    log::warn!("--json is not supported for `{cmd_name}` (ignored)");
}

pub fn run(cmd: Command, opts: &Options) -> Result<()> {
    match cmd {
        Command::Run { no_wheel } => {
            if opts.json {
                warn_json_unsupported("run");
            }
            run::cmd_run(&opts.load_config()?, no_wheel)
        }
        Command::Check => check::cmd_check(opts),
        Command::Probe => probe::cmd_probe(&opts.load_config()?, opts.json),
        Command::Devices => devices::cmd_devices(opts.json),
    }
}
