//! File playback: memory-mapped walk over a recorded wire-line file.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info, warn};

use super::{InputSource, Pull};
use crate::error::Result;
use crate::frame::WireLine;

pub struct FilePlayback {
    label: String,
    mmap: Option<Mmap>,
    offset: usize,
    line_count: usize,
}

impl FilePlayback {
    /// Open a playback file. A missing or unreadable file logs a warning and
    /// yields a source that is exhausted on first pull.
    pub fn open(path: &Path) -> Self {
        let label = format!("playback:{}", path.display());
        let mmap = match map_file(path) {
            Ok(m) => m,
            Err(e) => {
                warn!("[PLAY] Cannot open {}: {e}", path.display());
                None
            }
        };
        if let Some(m) = &mmap {
            info!("[PLAY] Loaded {} ({} bytes)", path.display(), m.len());
        }
        Self {
            label,
            mmap,
            offset: 0,
            line_count: 0,
        }
    }
}

fn map_file(path: &Path) -> std::io::Result<Option<Mmap>> {
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    // The file is only read; concurrent truncation by another process is
    // not guarded against.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Some(mmap))
}

impl InputSource for FilePlayback {
    fn pull(&mut self) -> Result<Pull> {
        let Some(mmap) = self.mmap.as_ref() else {
            return Ok(Pull::Exhausted);
        };
        let rest = &mmap[self.offset..];
        if rest.is_empty() {
            debug!("[PLAY] {} done after {} lines", self.label, self.line_count);
            return Ok(Pull::Exhausted);
        }

        let end = rest
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| i + 1)
            .unwrap_or(rest.len());
        let line = WireLine::from_raw(&rest[..end]);
        self.offset += end;
        self.line_count += 1;
        Ok(Pull::Frame(line))
    }

    fn label(&self) -> &str {
        &self.label
    }
}
