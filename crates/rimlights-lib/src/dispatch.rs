//! Per-cycle LED dispatch: indicator evaluation to wheel frames.
//!
//! [`Dispatcher`] owns the transport and both LED groups. The binary drives
//! it: [`startup`](Dispatcher::startup) once, [`cycle`](Dispatcher::cycle)
//! every `cycle_ms`, [`restore`](Dispatcher::restore) on exit.

use std::time::Duration;

use crate::binding::{ScalarType, ValueBinding};
use crate::config::Config;
use crate::error::Result;
use crate::frame::{self, LedGroup, LedMode};
use crate::indicator::Indicator;
use crate::led::Rgb;
use crate::settings::{Clause, config_error};
use crate::transport::{SerialChannel, Transport};

/// Mask with the low `count` bits set.
pub fn low_bits(count: u8) -> u32 {
    match count {
        0 => 0,
        c if c as u32 >= u32::BITS => u32::MAX,
        c => (1u32 << c) - 1,
    }
}

// ── Group evaluation ──

/// What to send for one group this cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupUpdate {
    /// Bit `n` lights LED `n`.
    pub mask: u32,
    /// Colors of lit multicolor indicators.
    pub colors: Vec<(u8, Rgb)>,
}

/// Indicators of one LED group and the bits always lit.
#[derive(Debug, Clone)]
pub struct LedGroupState {
    group: LedGroup,
    indicators: Vec<Indicator>,
    forced_on: u32,
}

impl LedGroupState {
    pub fn new(group: LedGroup, indicators: Vec<Indicator>) -> Self {
        Self {
            group,
            indicators,
            forced_on: 0,
        }
    }

    pub fn group(&self) -> LedGroup {
        self.group
    }

    pub fn indicators(&self) -> &[Indicator] {
        &self.indicators
    }

    /// Bits of positions that have an indicator.
    pub fn claimed(&self) -> u32 {
        self.indicators
            .iter()
            .fold(0, |bits, i| bits | (1 << i.position()))
    }

    pub fn forced_on(&self) -> u32 {
        self.forced_on
    }

    pub fn set_forced_on(&mut self, mask: u32) {
        self.forced_on = mask;
    }

    /// Snapshot every indicator and assemble this cycle's mask and colors.
    pub fn evaluate(&mut self, telemetry: &[u8]) -> GroupUpdate {
        let mut update = GroupUpdate {
            mask: self.forced_on,
            colors: Vec::new(),
        };
        let group = self.group.name();
        for ind in &mut self.indicators {
            ind.update(telemetry);
            log::trace!("{group} {}: {} -> {}", ind.path(), ind.last_value(), ind.is_on());
            if ind.is_on() {
                update.mask |= 1 << ind.position();
                if ind.is_multicolor() {
                    update.colors.push((ind.position(), ind.color()));
                }
            }
        }
        update
    }

    /// Current color of every indicator, lit or not.
    pub fn colors(&self) -> Vec<(u8, Rgb)> {
        self.indicators
            .iter()
            .map(|i| (i.position(), i.color()))
            .collect()
    }

    fn refresh(&mut self, telemetry: &[u8]) {
        for ind in &mut self.indicators {
            ind.update(telemetry);
        }
    }
}

// ── Session gate ──

/// Optional `[session]` condition for running a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionGate {
    /// Cycles run only while this reads true.
    pub active: Option<ValueBinding>,
    /// Cycles are skipped while this reads true.
    pub paused: Option<ValueBinding>,
}

impl SessionGate {
    /// Build from the `[session]` table; a missing table never gates.
    pub fn from_clause(root: &Clause<'_>, telemetry_len: usize) -> Result<Self> {
        let Some(session) = root.table("session")? else {
            return Ok(Self::default());
        };
        let field = |key: &str| -> Result<Option<ValueBinding>> {
            let path = session.key_path(key);
            match session.get(key) {
                None => Ok(None),
                Some(toml::Value::Table(t)) => {
                    ValueBinding::field_from_table(t, &path, ScalarType::Bool, telemetry_len)
                        .map(Some)
                }
                Some(other) => Err(config_error(
                    &path,
                    format!("expected {{ offset, type }}, got {}", other.type_str()),
                )),
            }
        };
        Ok(Self {
            active: field("active")?,
            paused: field("paused")?,
        })
    }

    /// Whether a cycle should run for this telemetry.
    pub fn allows(&self, telemetry: &[u8]) -> bool {
        let truthy = |b: &ValueBinding| {
            let s = b.snapshot(telemetry);
            s.flag.unwrap_or(s.value != 0.0)
        };
        self.active.as_ref().is_none_or(truthy) && !self.paused.as_ref().is_some_and(truthy)
    }
}

// ── Dispatcher ──

/// Result of one [`Dispatcher::cycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Frames were sent for both groups.
    Sent,
    /// The session gate was closed; nothing was sent.
    Skipped,
}

/// Drives both LED groups over one transport.
pub struct Dispatcher<C: SerialChannel> {
    transport: Transport<C>,
    rpm: LedGroupState,
    buttons: LedGroupState,
    gate: SessionGate,
    button_count: u8,
    batch_delay: Duration,
    saved_mode: LedMode,
    idle_buttons: Vec<(u8, Rgb)>,
}

impl<C: SerialChannel> Dispatcher<C> {
    pub fn new(
        transport: Transport<C>,
        rpm: Vec<Indicator>,
        buttons: Vec<Indicator>,
        button_count: u8,
    ) -> Self {
        Self {
            transport,
            rpm: LedGroupState::new(LedGroup::Rpm, rpm),
            buttons: LedGroupState::new(LedGroup::Buttons, buttons),
            gate: SessionGate::default(),
            button_count,
            batch_delay: Duration::from_millis(crate::protocol::DEFAULT_BATCH_DELAY_MS),
            saved_mode: LedMode::Off,
            idle_buttons: Vec::new(),
        }
    }

    /// Build indicators, gate and timings from `config`.
    pub fn from_config(config: &Config, transport: Transport<C>) -> Result<Self> {
        let rpm = config.indicators(LedGroup::Rpm)?;
        let buttons = config.indicators(LedGroup::Buttons)?;
        log::info!(
            "{} rpm indicator(s), {} button indicator(s)",
            rpm.len(),
            buttons.len()
        );
        Ok(Self::new(transport, rpm, buttons, config.button_count)
            .with_gate(config.session_gate()?)
            .with_batch_delay(config.batch_delay()))
    }

    pub fn with_gate(mut self, gate: SessionGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn transport(&self) -> &Transport<C> {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport<C> {
        &mut self.transport
    }

    pub fn rpm(&self) -> &LedGroupState {
        &self.rpm
    }

    pub fn buttons(&self) -> &LedGroupState {
        &self.buttons
    }

    /// RPM mode found on the wheel at startup.
    pub fn saved_mode(&self) -> LedMode {
        self.saved_mode
    }

    /// Button colors found on the wheel at startup.
    pub fn idle_buttons(&self) -> &[(u8, Rgb)] {
        &self.idle_buttons
    }

    /// Take over the LEDs: remember the wheel's state, load indicator colors
    /// and switch the RPM strip to telemetry mode.
    ///
    /// Queries are skipped on a closed channel; the idle state is then
    /// black buttons and an RPM strip that was off.
    pub fn startup(&mut self, telemetry: &[u8]) -> Result<()> {
        let online = self.transport.is_open();

        self.saved_mode = if online {
            read_mode(&mut self.transport, LedGroup::Rpm)?
        } else {
            LedMode::Off
        };
        log::info!("rpm strip was in {:?} mode", self.saved_mode);

        self.rpm.refresh(telemetry);
        let rpm_colors = self.rpm.colors();
        self.send_batch(LedGroup::Rpm, &rpm_colors)?;
        self.transport.send(&frame::set_rpm_mode(LedMode::Telemetry))?;
        self.transport
            .send(&frame::telemetry_mask(LedGroup::Rpm, 0))?;

        self.idle_buttons = (0..self.button_count)
            .map(|i| -> Result<(u8, Rgb)> {
                let color = if online {
                    read_color(&mut self.transport, LedGroup::Buttons, i)?
                } else {
                    Rgb::BLACK
                };
                Ok((i, color))
            })
            .collect::<Result<Vec<_>>>()?;

        self.buttons.refresh(telemetry);
        let mut merged = self.idle_buttons.clone();
        for (pos, color) in self.buttons.colors() {
            if let Some(slot) = merged.iter_mut().find(|(p, _)| *p == pos) {
                slot.1 = color;
            }
        }
        self.send_batch(LedGroup::Buttons, &merged)?;

        let forced = low_bits(self.button_count) & !self.buttons.claimed();
        self.buttons.set_forced_on(forced);
        log::debug!("buttons forced on: {forced:#06x}");
        Ok(())
    }

    /// Run one update cycle. Buttons are sent before the RPM strip.
    pub fn cycle(&mut self, telemetry: &[u8]) -> Result<CycleOutcome> {
        if !self.gate.allows(telemetry) {
            log::trace!("session inactive, cycle skipped");
            return Ok(CycleOutcome::Skipped);
        }
        let buttons = self.buttons.evaluate(telemetry);
        self.push(self.buttons.group(), &buttons)?;
        let rpm = self.rpm.evaluate(telemetry);
        self.push(self.rpm.group(), &rpm)?;
        Ok(CycleOutcome::Sent)
    }

    /// Give the LEDs back: blank the RPM strip and put back its mode, then
    /// light every button in its idle color.
    pub fn restore(&mut self) -> Result<()> {
        log::info!("restoring wheel LEDs");
        self.transport
            .send(&frame::telemetry_mask(LedGroup::Rpm, 0))?;
        self.transport
            .send(&frame::set_rpm_mode(self.saved_mode))?;
        let idle = GroupUpdate {
            mask: low_bits(self.button_count),
            colors: self.idle_buttons.clone(),
        };
        self.push(LedGroup::Buttons, &idle)
    }

    /// Send a color batch (if any), wait, then the mask.
    fn push(&mut self, group: LedGroup, update: &GroupUpdate) -> Result<()> {
        if !update.colors.is_empty() {
            self.send_batch(group, &update.colors)?;
            if !self.batch_delay.is_zero() {
                std::thread::sleep(self.batch_delay);
            }
        }
        self.transport
            .send(&frame::telemetry_mask(group, update.mask))?;
        Ok(())
    }

    fn send_batch(&mut self, group: LedGroup, colors: &[(u8, Rgb)]) -> Result<()> {
        for f in frame::set_telemetry_colors(group, colors) {
            self.transport.send(&f)?;
        }
        Ok(())
    }
}

/// Query a group's mode.
pub fn read_mode<C: SerialChannel>(transport: &mut Transport<C>, group: LedGroup) -> Result<LedMode> {
    Ok(transport.query_decoded(&frame::get_leds_mode(group), frame::parse_leds_mode)?)
}

/// Query one LED's static color.
pub fn read_color<C: SerialChannel>(
    transport: &mut Transport<C>,
    group: LedGroup,
    index: u8,
) -> Result<Rgb> {
    Ok(transport.query_decoded(&frame::get_led_color(group, index), frame::parse_led_color)?)
}
