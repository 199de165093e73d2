//! Generic append-only log writer
//!
//! Write-ahead-log style file appender: opens in append mode, writes whole
//! payloads, and flushes after every append so a crash loses at most the
//! entry being written. The core lifecycle logic does not use it directly;
//! the audit flush path does, and it is available as a standalone primitive.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::Result;

/// Append-only log file handle
#[derive(Debug)]
pub struct WalWriter {
    file: File,
}

impl WalWriter {
    /// Open (or create) the log file for appending
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    /// Append a payload and flush it to the file
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        self.file.flush()?;
        Ok(())
    }

    /// Append a payload followed by a newline
    pub fn append_line(&mut self, line: &str) -> Result<()> {
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()?;
        Ok(())
    }
}
