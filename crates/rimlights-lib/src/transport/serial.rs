//! Serial channel backends and wheel port discovery.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use super::SerialChannel;

/// Where udev publishes stable serial device names.
pub const SERIAL_BY_ID_DIR: &str = "/dev/serial/by-id";

/// Serial channel backed by the `serialport` crate.
pub struct SerialPortChannel {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortChannel {
    /// Open `path` at `baud_rate`.
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> io::Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|e| io::Error::other(format!("open {path}: {e}")))?;
        log::info!("opened {path} at {baud_rate} baud");
        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.port.set_timeout(timeout).map_err(io::Error::from)
    }
}

impl SerialChannel for SerialPortChannel {
    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)
    }

    fn read_byte(&mut self, timeout: Duration) -> io::Result<u8> {
        self.set_timeout(timeout)?;
        let mut b = [0u8; 1];
        self.port.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> io::Result<Vec<u8>> {
        self.set_timeout(timeout)?;
        let mut buf = vec![0u8; n];
        self.port.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn is_open(&self) -> bool {
        true
    }

    fn drain_output(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn flush_input(&mut self) -> io::Result<()> {
        if self.port.bytes_to_read().map_err(io::Error::from)? > 0 {
            self.port.clear(ClearBuffer::Input).map_err(io::Error::from)?;
        }
        Ok(())
    }
}

/// Channel that is never open. Used when running without a wheel attached:
/// sends are dropped and queries fail with [`TransportError::Closed`](super::TransportError::Closed).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullChannel;

impl SerialChannel for NullChannel {
    fn write(&mut self, _bytes: &[u8]) -> io::Result<()> {
        Ok(())
    }

    fn read_byte(&mut self, _timeout: Duration) -> io::Result<u8> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "no wheel"))
    }

    fn read_exact(&mut self, _n: usize, _timeout: Duration) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::NotConnected, "no wheel"))
    }

    fn is_open(&self) -> bool {
        false
    }

    fn drain_output(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn flush_input(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── Discovery ──

/// Find the wheel base's serial device: the first entry of `dir` (sorted by
/// name) whose file name contains `pattern`.
pub fn find_wheel_port(dir: &Path, pattern: &str) -> io::Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("{}: {e} (connect the wheel)", dir.display()),
        )
    })?;
    let mut names: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(pattern))
        })
        .collect();
    names.sort();
    names.into_iter().next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no serial device matching '{pattern}' in {}", dir.display()),
        )
    })
}

/// A serial port known to the OS.
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub name: String,
    pub kind: String,
    pub product: Option<String>,
}

/// List serial ports known to the OS. Enumeration failures yield an empty list.
pub fn list_ports() -> Vec<PortInfo> {
    let ports = match serialport::available_ports() {
        Ok(p) => p,
        Err(e) => {
            log::warn!("serial port enumeration failed: {e}");
            return Vec::new();
        }
    };
    ports
        .into_iter()
        .map(|p| {
            let (kind, product) = match p.port_type {
                SerialPortType::UsbPort(usb) => (
                    format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                    usb.product,
                ),
                SerialPortType::BluetoothPort => ("bluetooth".to_string(), None),
                SerialPortType::PciPort => ("pci".to_string(), None),
                SerialPortType::Unknown => ("unknown".to_string(), None),
            };
            PortInfo {
                name: p.port_name,
                kind,
                product,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_channel_is_closed() {
        let mut ch = NullChannel;
        assert!(!ch.is_open());
        assert!(ch.write(&[1, 2, 3]).is_ok());
        assert!(ch.read_byte(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn find_wheel_port_matches_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("usb-Other_Device-if00"), "").unwrap();
        std::fs::write(dir.path().join("usb-Gudsen_MOZA_R9_Base_123-if00"), "").unwrap();
        let found = find_wheel_port(dir.path(), "Base").unwrap();
        assert_eq!(
            found.file_name().unwrap(),
            "usb-Gudsen_MOZA_R9_Base_123-if00"
        );
    }

    #[test]
    fn find_wheel_port_picks_first_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-Base"), "").unwrap();
        std::fs::write(dir.path().join("a-Base"), "").unwrap();
        let found = find_wheel_port(dir.path(), "Base").unwrap();
        assert_eq!(found.file_name().unwrap(), "a-Base");
    }

    #[test]
    fn find_wheel_port_no_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("usb-Keyboard"), "").unwrap();
        let err = find_wheel_port(dir.path(), "Base").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn find_wheel_port_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_wheel_port(&dir.path().join("nope"), "Base").unwrap_err();
        assert!(err.to_string().contains("connect the wheel"));
    }

    #[test]
    fn list_ports_returns_vec() {
        // Just verify it doesn't panic on machines without serial hardware.
        let _ = list_ports();
    }
}
