//! Append-only JSONL file sink
//!
//! One sink owns one path. Appends from any number of threads serialize
//! through a single lock, and each line is written with one `write_all`
//! of `line + "\n"`, so lines never interleave. The file is opened lazily
//! on the first append, created if absent, and never truncated, rotated or
//! read back.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, trace};

use crate::error::{Result, TelemetryError};

use super::TelemetrySink;

/// Default bound on the wait for the append lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5_000);

/// File-based sink writing newline-delimited JSON
#[derive(Debug)]
pub struct JsonlFileSink {
    path: PathBuf,

    /// `None` waits indefinitely
    lock_timeout: Option<Duration>,

    /// `fsync` file data after every line
    sync_on_write: bool,

    /// Open handle, populated on first append
    file: Mutex<Option<File>>,
}

impl JsonlFileSink {
    /// Create a sink for the given file path. Nothing is touched on disk yet.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
            sync_on_write: false,
            file: Mutex::new(None),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_sync_on_write(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a file handle is currently held
    pub fn is_open(&self) -> bool {
        self.file.lock().is_some()
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Option<File>>> {
        match self.lock_timeout {
            None => Ok(self.file.lock()),
            Some(timeout) => {
                let started = Instant::now();
                self.file.try_lock_for(timeout).ok_or_else(|| {
                    TelemetryError::WriteTimeout {
                        path: self.path.display().to_string(),
                        waited_ms: started.elapsed().as_millis() as u64,
                    }
                })
            }
        }
    }

    fn open(&self) -> Result<File> {
        self.ensure_ready()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TelemetryError::write_failure(&self.path, &e))?;
        info!(path = %self.path.display(), "Opened telemetry log");
        Ok(file)
    }
}

impl TelemetrySink for JsonlFileSink {
    fn ensure_ready(&self) -> Result<()> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|e| TelemetryError::write_failure(dir, &e))
            }
            _ => Ok(()),
        }
    }

    fn append_line(&self, line: &str) -> Result<()> {
        let mut guard = self.acquire()?;

        if guard.is_none() {
            *guard = Some(self.open()?);
        }

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line.as_bytes());
        record.push(b'\n');

        let written = match guard.as_mut() {
            Some(file) => file.write_all(&record).and_then(|()| {
                if self.sync_on_write {
                    file.sync_data()
                } else {
                    Ok(())
                }
            }),
            None => return Err(TelemetryError::StorageLocked),
        };

        if let Err(e) = written {
            // Reopen on the next append rather than reuse a failed handle
            *guard = None;
            return Err(TelemetryError::write_failure(&self.path, &e));
        }

        trace!(path = %self.path.display(), bytes = record.len(), "Appended line");
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        let mut guard = self.acquire()?;
        if let Some(file) = guard.as_mut() {
            file.flush()
                .and_then(|()| file.sync_data())
                .map_err(|e| TelemetryError::write_failure(&self.path, &e))?;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.acquire()?;
        if let Some(mut file) = guard.take() {
            file.flush()
                .and_then(|()| file.sync_all())
                .map_err(|e| TelemetryError::write_failure(&self.path, &e))?;
            debug!(path = %self.path.display(), "Closed telemetry log");
        }
        Ok(())
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn name(&self) -> &'static str {
        "jsonl-file"
    }
}

impl Drop for JsonlFileSink {
    fn drop(&mut self) {
        if let Some(file) = self.file.get_mut().as_mut() {
            let _ = file.sync_data();
        }
    }
}
