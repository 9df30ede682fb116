//! Capture of received traffic to disk
//!
//! Controllers hand every received frame to a [`CaptureSink`] without caring
//! whether anything is recorded. Whether capture happens is decided by which
//! sink the host was built with.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error};

use crate::error::HostError;

/// Destination for captured frames
pub trait CaptureSink {
    /// Begin a new capture (one per transmission)
    fn open(&mut self) -> Result<(), HostError>;

    /// Append one frame to the current capture
    fn write(&mut self, data: &[u8]) -> Result<(), HostError>;

    /// Finish the current capture
    fn close(&mut self);
}

/// A sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCapture;

impl CaptureSink for NullCapture {
    fn open(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), HostError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// Writes each transmission to its own timestamped file
///
/// Files are named `<PREFIX>_YYYYMMDD_HHMMSS.ambe` and start with the prefix
/// as a magic marker, followed by the raw frames back to back. The timestamp
/// is UTC, not local time. An existing capture is never overwritten: a second
/// transmission starting within the same second gets a `_1`, `_2`, ... suffix.
#[derive(Debug)]
pub struct FileCaptureSink {
    dir: PathBuf,
    prefix: String,
    file: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl FileCaptureSink {
    /// Create a sink writing into `dir`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            file: None,
            path: None,
        }
    }

    /// Path of the capture in progress
    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl CaptureSink for FileCaptureSink {
    fn open(&mut self) -> Result<(), HostError> {
        self.close();

        let stem = format!("{}_{}", self.prefix, timestamp(SystemTime::now()));
        let (file, path) = create_unique(&self.dir, &stem)?;

        let mut file = BufWriter::new(file);
        file.write_all(self.prefix.as_bytes())?;

        debug!("Capturing to {}", path.display());
        self.file = Some(file);
        self.path = Some(path);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), HostError> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(data)?;
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut file) = self.file.take() {
            if let Err(e) = file.flush() {
                error!("Failed to flush capture file: {}", e);
            }
        }
        self.path = None;
    }
}

impl Drop for FileCaptureSink {
    fn drop(&mut self) {
        self.close();
    }
}

/// Create `<stem>.ambe` in `dir`, or the first free `<stem>_<n>.ambe`
fn create_unique(dir: &Path, stem: &str) -> io::Result<(File, PathBuf)> {
    let mut n = 0u32;
    loop {
        let name = if n == 0 {
            format!("{}.ambe", stem)
        } else {
            format!("{}_{}.ambe", stem, n)
        };
        let path = dir.join(name);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Format a time as `YYYYMMDD_HHMMSS` in UTC
fn timestamp(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let days = (secs / 86_400) as i64;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);

    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}",
        year,
        month,
        day,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Convert days since 1970-01-01 to a (year, month, day) date
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timestamp_format() {
        assert_eq!(timestamp(UNIX_EPOCH), "19700101_000000");

        // 2024-02-29 13:45:07 UTC
        let leap = UNIX_EPOCH + Duration::from_secs(1_709_214_307);
        assert_eq!(timestamp(leap), "20240229_134507");
    }

    #[test]
    fn test_file_capture_writes_magic_and_frames() {
        let dir = std::env::temp_dir().join(format!("dvgate-capture-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut sink = FileCaptureSink::new(&dir, "YSF");
        sink.open().unwrap();
        let path = sink.current_path().unwrap().to_path_buf();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("YSF_"));

        sink.write(&[0xAA; 120]).unwrap();
        sink.write(&[0xBB; 120]).unwrap();
        sink.close();

        let contents = std::fs::read(&path).unwrap();
        assert_eq!(&contents[..3], b"YSF");
        assert_eq!(contents.len(), 3 + 240);
        assert_eq!(contents[3], 0xAA);
        assert_eq!(contents[123], 0xBB);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_same_second_captures_do_not_collide() {
        let dir = std::env::temp_dir().join(format!("dvgate-unique-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let (mut first, first_path) = create_unique(&dir, "YSF_20240229_134507").unwrap();
        first.write_all(b"first").unwrap();
        let (_, second_path) = create_unique(&dir, "YSF_20240229_134507").unwrap();
        let (_, third_path) = create_unique(&dir, "YSF_20240229_134507").unwrap();

        assert_eq!(first_path.file_name().unwrap(), "YSF_20240229_134507.ambe");
        assert_eq!(second_path.file_name().unwrap(), "YSF_20240229_134507_1.ambe");
        assert_eq!(third_path.file_name().unwrap(), "YSF_20240229_134507_2.ambe");
        assert_eq!(std::fs::read(&first_path).unwrap(), b"first");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_write_without_open_is_ignored() {
        let mut sink = FileCaptureSink::new(std::env::temp_dir(), "YSF");
        assert!(sink.write(&[0u8; 4]).is_ok());
        assert!(sink.current_path().is_none());
    }
}
