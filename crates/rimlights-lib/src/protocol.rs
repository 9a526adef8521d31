//! Protocol constants for the wheel LED controller serial link.
//!
//! Every frame has the same layout:
//!
//! ```text
//! [START][len][kind][DEVICE][opcode][target][payload...][checksum]
//! ```
//!
//! - `len` counts the bytes after the 4-byte header, excluding the checksum.
//! - `kind` is [`KIND_WRITE`] for commands the host issues authoritatively and
//!   [`KIND_READ`] for queries. Replies echo it with the high bit set.
//! - Replies echo [`DEVICE_ID`] with its nibbles swapped (`0x17` → `0x71`).
//! - `checksum` is the byte sum of everything before it plus
//!   [`CHECKSUM_SEED`], truncated to 8 bits. The device silently drops frames
//!   whose checksum is off.

// ── Framing ──

/// Start-of-frame marker.
pub const START: u8 = 0x7e;

/// Command kind for writes.
pub const KIND_WRITE: u8 = 0x3f;

/// Command kind for queries.
pub const KIND_READ: u8 = 0x40;

/// Device address of the wheel LED controller.
pub const DEVICE_ID: u8 = 0x17;

/// Constant folded into every checksum.
pub const CHECKSUM_SEED: u8 = 0x0d;

/// Header bytes before the payload: start, len, kind, device.
pub const HEADER_LEN: usize = 4;

/// Index of the length byte.
pub const OFF_LEN: usize = 1;

/// Index of the command kind byte (echoed with bit 7 set in replies).
pub const OFF_KIND: usize = 2;

/// Index of the device byte (echoed nibble-swapped in replies).
pub const OFF_DEVICE: usize = 3;

/// Index of the opcode byte.
pub const OFF_OPCODE: usize = 4;

/// Index of the target (LED group) byte.
pub const OFF_TARGET: usize = 5;

// ── Opcodes ──

/// Single LED color, get or set. Payload: `[0xff, index, r, g, b]`.
pub const OP_LED_COLOR: u8 = 0x1f;

/// LED mode, get or set. Payload: `[mode]`.
pub const OP_LED_MODE: u8 = 0x1c;

/// Batched telemetry colors. Payload: up to five `[index, r, g, b]` entries.
pub const OP_TELEMETRY_COLORS: u8 = 0x19;

/// Telemetry on/off bitmask. Payload: `u32` little-endian.
pub const OP_TELEMETRY_MASK: u8 = 0x1a;

/// Filler byte preceding the LED index in single-color frames.
pub const LED_COLOR_PREFIX: u8 = 0xff;

// ── Limits ──

/// Maximum `(index, color)` entries the device accepts in one batch frame.
pub const MAX_BATCH_ENTRIES: usize = 5;

/// Bytes per batch entry: index + RGB.
pub const BATCH_ENTRY_LEN: usize = 4;

/// Highest LED count addressable through the 32-bit telemetry mask.
pub const MASK_BITS: usize = 32;

/// Number of backlit buttons on the stock rim.
pub const DEFAULT_BUTTON_COUNT: u8 = 14;

// ── Link timing ──

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default per-read timeout while waiting for a reply, in milliseconds.
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 200;

/// Default number of resends after a corrupted reply.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default pause between a color batch and the following mask, in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 1;
