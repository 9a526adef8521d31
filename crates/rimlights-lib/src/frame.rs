//! Frame construction and reply decoding for the six LED commands.
//!
//! Builders return complete frames (checksum included) ready for
//! [`Transport`](crate::transport::Transport). Nothing here does I/O.

use crate::led::Rgb;
use crate::protocol::*;
use crate::transport::{Result, TransportError};

/// One of the two independently addressed LED sets on the rim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedGroup {
    /// Shift-light strip.
    Rpm = 0,
    /// Backlit buttons.
    Buttons = 1,
}

impl LedGroup {
    pub fn name(self) -> &'static str {
        match self {
            LedGroup::Rpm => "rpm",
            LedGroup::Buttons => "buttons",
        }
    }
}

/// LED group operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMode {
    Off = 0,
    /// Driven by telemetry mask frames.
    Telemetry = 1,
    On = 2,
}

impl TryFrom<u8> for LedMode {
    type Error = TransportError;

    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(LedMode::Off),
            1 => Ok(LedMode::Telemetry),
            2 => Ok(LedMode::On),
            other => Err(TransportError::Nok(format!("unknown LED mode {other}"))),
        }
    }
}

/// Checksum over `bytes`: byte sum plus [`CHECKSUM_SEED`], modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(CHECKSUM_SEED, |acc, &b| acc.wrapping_add(b))
}

/// Assemble a frame from `kind` and the bytes following the header.
fn build(kind: u8, body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len() + 1);
    frame.extend_from_slice(&[START, body.len() as u8, kind, DEVICE_ID]);
    frame.extend_from_slice(body);
    frame.push(checksum(&frame));
    frame
}

// ── Writes ──

/// Set a single LED's static color.
pub fn set_led_color(group: LedGroup, index: u8, color: Rgb) -> Vec<u8> {
    let [r, g, b] = color.to_bytes();
    build(
        KIND_WRITE,
        &[OP_LED_COLOR, group as u8, LED_COLOR_PREFIX, index, r, g, b],
    )
}

/// Switch the RPM strip mode. Button LEDs ignore this command.
pub fn set_rpm_mode(mode: LedMode) -> Vec<u8> {
    build(KIND_WRITE, &[OP_LED_MODE, LedGroup::Rpm as u8, mode as u8])
}

/// Telemetry color batches for `entries`, sorted by LED index and split into
/// frames of at most [`MAX_BATCH_ENTRIES`]. Empty input yields no frames.
pub fn set_telemetry_colors(group: LedGroup, entries: &[(u8, Rgb)]) -> Vec<Vec<u8>> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|&(index, _)| index);

    sorted
        .chunks(MAX_BATCH_ENTRIES)
        .map(|chunk| {
            let mut body = Vec::with_capacity(2 + chunk.len() * BATCH_ENTRY_LEN);
            body.extend_from_slice(&[OP_TELEMETRY_COLORS, group as u8]);
            for &(index, color) in chunk {
                body.push(index);
                body.extend_from_slice(&color.to_bytes());
            }
            build(KIND_WRITE, &body)
        })
        .collect()
}

/// Telemetry on/off mask; bit `n` lights LED `n`.
pub fn telemetry_mask(group: LedGroup, mask: u32) -> Vec<u8> {
    let mut body = vec![OP_TELEMETRY_MASK, group as u8];
    body.extend_from_slice(&mask.to_le_bytes());
    build(KIND_WRITE, &body)
}

// ── Queries ──

/// Query a group's current mode.
pub fn get_leds_mode(group: LedGroup) -> Vec<u8> {
    build(KIND_READ, &[OP_LED_MODE, group as u8, 0])
}

/// Query one LED's static color.
pub fn get_led_color(group: LedGroup, index: u8) -> Vec<u8> {
    build(
        KIND_READ,
        &[OP_LED_COLOR, group as u8, LED_COLOR_PREFIX, index, 0, 0, 0],
    )
}

// ── Replies ──

/// Swap the high and low nibbles of a byte.
pub fn swap_nibbles(b: u8) -> u8 {
    b.rotate_left(4)
}

/// Whether a reply header belongs to `request`: the kind byte must match with
/// bit 7 masked off, and the device byte must match once its nibbles are swapped.
pub fn reply_matches(request: &[u8], reply: &[u8]) -> bool {
    request.len() > OFF_DEVICE
        && reply.len() > OFF_DEVICE
        && request[OFF_KIND] == reply[OFF_KIND] & 0x7f
        && request[OFF_DEVICE] == swap_nibbles(reply[OFF_DEVICE])
}

/// Whether the trailing byte of `frame` is the checksum of the rest.
pub fn checksum_valid(frame: &[u8]) -> bool {
    match frame.split_last() {
        Some((&sum, rest)) => checksum(rest) == sum,
        None => false,
    }
}

fn reply_byte(reply: &[u8], index: usize, what: &str) -> Result<u8> {
    reply.get(index).copied().ok_or_else(|| {
        TransportError::Nok(format!(
            "{what}: reply too short ({} bytes, need {})",
            reply.len(),
            index + 1
        ))
    })
}

/// Decode the mode byte of a [`get_leds_mode`] reply.
pub fn parse_leds_mode(reply: &[u8]) -> Result<LedMode> {
    LedMode::try_from(reply_byte(reply, OFF_TARGET + 1, "LED mode")?)
}

/// Decode the color of a [`get_led_color`] reply.
pub fn parse_led_color(reply: &[u8]) -> Result<Rgb> {
    let base = OFF_TARGET + 3;
    Ok(Rgb::new(
        reply_byte(reply, base, "LED color")?,
        reply_byte(reply, base + 1, "LED color")?,
        reply_byte(reply, base + 2, "LED color")?,
    ))
}

/// Space-separated lowercase hex, for frame dumps in logs.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}
