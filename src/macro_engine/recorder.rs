//! Frame sink: appends every outgoing wire line to a file.
//!
//! Used both for whole-run recording and for nested macro captures. The
//! file is flushed and closed on `close()` and, failing that, on drop.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::frame::WireLine;

pub struct FrameSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    frames: usize,
}

impl FrameSink {
    /// Create (or truncate) the sink file. A missing parent directory is
    /// reported as `FileNotFound`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            frames: 0,
        })
    }

    pub fn write(&mut self, line: &WireLine) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(line.as_bytes())?;
            self.frames += 1;
        }
        Ok(())
    }

    /// Flush and close. Idempotent. Returns the number of frames written.
    pub fn close(&mut self) -> Result<usize> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            info!(
                "[REC] Closed {}: {} frames",
                self.path.display(),
                self.frames
            );
        }
        Ok(self.frames)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FrameSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("[REC] Failed to flush {}: {e}", self.path.display());
        }
    }
}
