//! Serial transport: channel trait, fire-and-forget sends, and queries with
//! reply correlation, timeouts and retry on corrupted replies.

mod serial;

use std::fmt;
use std::io;
use std::time::Duration;

use crate::frame::{self, hex};
use crate::protocol::{
    DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_RETRIES, HEADER_LEN, OFF_LEN, START,
};

pub use serial::{
    NullChannel, PortInfo, SERIAL_BY_ID_DIR, SerialPortChannel, find_wheel_port, list_ports,
};

// ── Error type ──

/// Serial link errors.
///
/// String payloads follow the convention **"context: details"**.
#[derive(Debug)]
pub enum TransportError {
    /// No start marker or an incomplete frame within the read timeout.
    Timeout(String),
    /// Corrupted or malformed reply.
    Nok(String),
    /// The channel is not open.
    Closed,
    /// Write or read failure other than a timeout.
    Io(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(e) => write!(f, "Timed out waiting for reply: {e}"),
            TransportError::Nok(e) => write!(f, "Corrupted reply (NOK): {e}"),
            TransportError::Closed => write!(f, "Serial channel is not open"),
            TransportError::Io(e) => write!(f, "Serial I/O failed: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Map a channel read error, keeping timeouts distinct from other failures.
fn read_error(context: &str, e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::TimedOut {
        TransportError::Timeout(context.to_string())
    } else {
        TransportError::Io(format!("{context}: {e}"))
    }
}

// ── Channel trait ──

/// Byte-level access to the serial device.
///
/// Reads report a timeout as an [`io::Error`] of kind [`io::ErrorKind::TimedOut`].
pub trait SerialChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8>;
    fn read_exact(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>>;
    fn is_open(&self) -> bool;
    /// Block until everything written has been transmitted.
    fn drain_output(&mut self) -> io::Result<()>;
    /// Discard anything received but not yet read.
    fn flush_input(&mut self) -> io::Result<()>;
}

// ── Reply state machine ──

/// Position of the reply reader within a frame.
enum ReadState {
    /// Discarding bytes until [`START`].
    WaitStart,
    /// Reading length, kind and device bytes.
    Header,
    /// Reading `len` payload bytes and the checksum.
    Body { header: Vec<u8> },
    /// Complete frame read, checking correlation and checksum.
    Validate { reply: Vec<u8> },
}

/// Owns the serial channel for the process lifetime.
pub struct Transport<C: SerialChannel> {
    channel: C,
    timeout: Duration,
    retries: u32,
}

impl<C: SerialChannel> Transport<C> {
    /// Create a transport with the default reply timeout and retry budget.
    pub fn new(channel: C) -> Self {
        Self::with_settings(
            channel,
            Duration::from_millis(DEFAULT_RESPONSE_TIMEOUT_MS),
            DEFAULT_RETRIES,
        )
    }

    pub fn with_settings(channel: C, timeout: Duration, retries: u32) -> Self {
        Self {
            channel,
            timeout,
            retries,
        }
    }

    pub fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Send a frame without waiting for a reply.
    ///
    /// A closed channel is not an error: the frame is logged and dropped.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        log::debug!("-> {}", hex(frame));
        if !self.channel.is_open() {
            return Ok(());
        }
        self.write_frame(frame)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.channel
            .drain_output()
            .map_err(|e| TransportError::Io(format!("drain output: {e}")))?;
        self.channel
            .flush_input()
            .map_err(|e| TransportError::Io(format!("flush input: {e}")))?;
        self.channel
            .write(frame)
            .map_err(|e| TransportError::Io(format!("write: {e}")))
    }

    /// Send a query and return the correlated reply, with the default budget.
    pub fn query(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.query_with_retries(request, self.retries)
    }

    /// Send a query and return the correlated reply.
    ///
    /// A corrupted reply resends the request, at most `retries` times.
    /// Timeouts are returned immediately without resending.
    pub fn query_with_retries(&mut self, request: &[u8], retries: u32) -> Result<Vec<u8>> {
        self.exchange(request, retries, |reply| Ok(reply.to_vec()))
    }

    /// Send a query and decode the correlated reply with `decode`.
    ///
    /// A reply `decode` rejects with [`TransportError::Nok`] is treated like a
    /// checksum mismatch and the request is resent.
    pub fn query_decoded<T>(
        &mut self,
        request: &[u8],
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        self.exchange(request, self.retries, decode)
    }

    fn exchange<T>(
        &mut self,
        request: &[u8],
        retries: u32,
        decode: impl Fn(&[u8]) -> Result<T>,
    ) -> Result<T> {
        if !self.channel.is_open() {
            return Err(TransportError::Closed);
        }
        let mut remaining = retries;
        loop {
            log::debug!("-> {}", hex(request));
            self.write_frame(request)?;
            let decoded = self.receive_reply(request).and_then(|reply| {
                log::debug!("<- {}", hex(&reply));
                decode(&reply)
            });
            match decoded {
                Ok(value) => return Ok(value),
                Err(TransportError::Nok(e)) if remaining > 0 => {
                    remaining -= 1;
                    log::warn!("NOK ({e}), retrying ({remaining} left)");
                }
                Err(TransportError::Nok(e)) => {
                    log::error!("NOK ({e}), giving up after {} attempts", retries + 1);
                    return Err(TransportError::Nok(e));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Read frames until one correlates with `request`.
    fn receive_reply(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let mut state = ReadState::WaitStart;
        loop {
            state = match state {
                ReadState::WaitStart => {
                    let b = self
                        .channel
                        .read_byte(self.timeout)
                        .map_err(|e| read_error("waiting for start marker", e))?;
                    if b == START {
                        ReadState::Header
                    } else {
                        ReadState::WaitStart
                    }
                }
                ReadState::Header => {
                    let rest = self
                        .channel
                        .read_exact(HEADER_LEN - 1, self.timeout)
                        .map_err(|e| read_error("reading header", e))?;
                    let mut header = Vec::with_capacity(HEADER_LEN);
                    header.push(START);
                    header.extend_from_slice(&rest);
                    ReadState::Body { header }
                }
                ReadState::Body { mut header } => {
                    let len = header[OFF_LEN] as usize;
                    let body = self
                        .channel
                        .read_exact(len + 1, self.timeout)
                        .map_err(|e| read_error("reading body", e))?;
                    header.extend_from_slice(&body);
                    ReadState::Validate { reply: header }
                }
                ReadState::Validate { reply } => {
                    if !frame::reply_matches(request, &reply) {
                        log::debug!("<- (unrelated, dropped) {}", hex(&reply));
                        ReadState::WaitStart
                    } else if !frame::checksum_valid(&reply) {
                        return Err(TransportError::Nok(format!(
                            "checksum mismatch in {}",
                            hex(&reply)
                        )));
                    } else {
                        return Ok(reply);
                    }
                }
            };
        }
    }
}

// ── Mock channel for testing ──

/// In-memory serial channel for unit and integration tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;

    /// One scripted read outcome.
    #[derive(Debug, Clone)]
    pub enum Incoming {
        Bytes(Vec<u8>),
        /// The next read times out.
        Timeout,
    }

    /// Scripted serial channel.
    ///
    /// Writes are recorded in `written`. Reads consume `incoming` in order;
    /// an exhausted script reads as a timeout. A write may trigger a queued
    /// reply from `replies`, so retry tests can answer each resend.
    #[derive(Debug, Default)]
    pub struct MockChannel {
        pub written: Vec<Vec<u8>>,
        pub incoming: VecDeque<Incoming>,
        pub replies: VecDeque<Vec<Incoming>>,
        pub closed: bool,
        pub input_flushes: usize,
        pending: VecDeque<u8>,
    }

    impl MockChannel {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue bytes available to read immediately.
        pub fn push_bytes(&mut self, bytes: &[u8]) {
            self.incoming.push_back(Incoming::Bytes(bytes.to_vec()));
        }

        /// Queue a read timeout.
        pub fn push_timeout(&mut self) {
            self.incoming.push_back(Incoming::Timeout);
        }

        /// Queue what the device sends after the next unanswered write.
        pub fn reply_on_write(&mut self, script: Vec<Incoming>) {
            self.replies.push_back(script);
        }

        /// Frames written with the given opcode.
        pub fn written_with_opcode(&self, opcode: u8) -> Vec<&Vec<u8>> {
            self.written
                .iter()
                .filter(|f| f.get(crate::protocol::OFF_OPCODE) == Some(&opcode))
                .collect()
        }

        fn next_byte(&mut self) -> io::Result<u8> {
            loop {
                if let Some(b) = self.pending.pop_front() {
                    return Ok(b);
                }
                match self.incoming.pop_front() {
                    Some(Incoming::Bytes(bytes)) => self.pending.extend(bytes),
                    Some(Incoming::Timeout) | None => {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, "mock timeout"));
                    }
                }
            }
        }
    }

    impl SerialChannel for MockChannel {
        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.written.push(bytes.to_vec());
            if let Some(script) = self.replies.pop_front() {
                self.incoming.extend(script);
            }
            Ok(())
        }

        fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
            self.next_byte()
        }

        fn read_exact(&mut self, n: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
            (0..n).map(|_| self.next_byte()).collect()
        }

        fn is_open(&self) -> bool {
            !self.closed
        }

        fn drain_output(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn flush_input(&mut self) -> io::Result<()> {
            self.input_flushes += 1;
            Ok(())
        }
    }

    /// Build the reply the device gives to `request`, carrying `payload`
    /// after the target byte.
    pub fn device_reply(request: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut r = request[..request.len() - 1].to_vec();
        r[crate::protocol::OFF_KIND] |= 0x80;
        r[crate::protocol::OFF_DEVICE] = frame::swap_nibbles(r[crate::protocol::OFF_DEVICE]);
        let start = crate::protocol::OFF_TARGET + 1;
        r[start..start + payload.len()].copy_from_slice(payload);
        r.push(frame::checksum(&r));
        r
    }

    /// `reply` with its checksum byte broken.
    pub fn corrupted(mut reply: Vec<u8>) -> Vec<u8> {
        if let Some(last) = reply.last_mut() {
            *last = last.wrapping_add(1);
        }
        reply
    }
}
