//! Read-only mapping of the simulator's telemetry file.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use memmap2::Mmap;

/// How often [`TelemetryMap::wait_for`] retries.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The telemetry buffer, shared with the simulator.
#[derive(Debug)]
pub struct TelemetryMap {
    map: Mmap,
    size: usize,
}

impl TelemetryMap {
    /// Map `path`, which must hold at least `size` bytes.
    pub fn open(path: &Path, size: usize) -> io::Result<Self> {
        let file = File::open(path)
            .map_err(|e| io::Error::new(e.kind(), format!("{}: {e}", path.display())))?;
        let len = file.metadata()?.len();
        if len < size as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{}: {len} bytes, telemetry_size is {size}",
                    path.display()
                ),
            ));
        }
        // SAFETY: the mapping is read-only. The simulator rewrites the file in
        // place; torn reads are tolerated and every read is bounds-checked.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| io::Error::new(e.kind(), format!("mmap {}: {e}", path.display())))?;
        Ok(Self { map, size })
    }

    /// Poll until `path` can be mapped, or `running` is cleared.
    ///
    /// Returns `Ok(None)` on shutdown. Only a missing file is waited out; the
    /// simulator may simply not be running yet. Any other failure, such as a
    /// file shorter than `size`, is returned.
    pub fn wait_for(
        path: &Path,
        size: usize,
        interval: Duration,
        running: &AtomicBool,
    ) -> io::Result<Option<Self>> {
        while running.load(Ordering::SeqCst) {
            match Self::open(path, size) {
                Ok(map) => {
                    log::info!("telemetry mapped from {}", path.display());
                    return Ok(Some(map));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    log::trace!("telemetry not ready: {e}");
                }
                Err(e) => return Err(e),
            }
            std::thread::sleep(interval);
        }
        Ok(None)
    }

    /// The first `telemetry_size` bytes of the file.
    pub fn as_bytes(&self) -> &[u8] {
        &self.map[..self.size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_maps_requested_prefix() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        f.flush().unwrap();
        let map = TelemetryMap::open(f.path(), 4).unwrap();
        assert_eq!(map.as_bytes(), &[1, 2, 3, 4]);
    }

    #[test]
    fn open_short_file_fails() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0; 4]).unwrap();
        f.flush().unwrap();
        let err = TelemetryMap::open(f.path(), 16).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = TelemetryMap::open(&dir.path().join("shm"), 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn wait_for_returns_none_when_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let running = AtomicBool::new(false);
        let map = TelemetryMap::wait_for(
            &dir.path().join("shm"),
            4,
            Duration::from_millis(1),
            &running,
        )
        .unwrap();
        assert!(map.is_none());
    }

    #[test]
    fn wait_for_finds_existing_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[9; 8]).unwrap();
        f.flush().unwrap();
        let running = AtomicBool::new(true);
        let map = TelemetryMap::wait_for(f.path(), 8, Duration::from_millis(1), &running)
            .unwrap()
            .unwrap();
        assert_eq!(map.as_bytes()[0], 9);
    }

    #[test]
    fn wait_for_short_file_fails_instead_of_polling() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0; 4]).unwrap();
        f.flush().unwrap();
        let running = AtomicBool::new(true);
        let err = TelemetryMap::wait_for(f.path(), 64, Duration::from_millis(1), &running)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("telemetry_size is 64"));
    }
}
