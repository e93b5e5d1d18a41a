//! LIFO input stack.
//!
//! The bottom source is the baseline stream (live pad or playback file).
//! Macros are pushed on top and own the output until they exhaust, at which
//! point they are dropped and the source underneath resumes exactly where it
//! left off. Every frame leaving the stack is copied to the recording sink
//! and the macro-capture sink, whichever are open.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::macro_engine::recorder::FrameSink;
use crate::source::{InputSource, Pull};

#[derive(Default)]
pub struct InputStack {
    sources: Vec<Box<dyn InputSource>>,
    recording: Option<FrameSink>,
    capture: Option<FrameSink>,
}

impl InputStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Box<dyn InputSource>) {
        info!(
            "[STACK] Push {} (depth {})",
            source.label(),
            self.sources.len() + 1
        );
        self.sources.push(source);
    }

    /// Pull from the topmost source, dropping exhausted sources on the way.
    pub fn pull(&mut self) -> Result<Pull> {
        loop {
            let Some(top) = self.sources.last_mut() else {
                return Ok(Pull::Exhausted);
            };
            match top.pull()? {
                Pull::Frame(line) => {
                    if let Some(sink) = self.recording.as_mut() {
                        sink.write(&line)?;
                    }
                    if let Some(sink) = self.capture.as_mut() {
                        sink.write(&line)?;
                    }
                    return Ok(Pull::Frame(line));
                }
                Pull::Exhausted => {
                    if let Some(done) = self.sources.pop() {
                        info!(
                            "[STACK] {} exhausted, {} source(s) left",
                            done.label(),
                            self.sources.len()
                        );
                    }
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.sources.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn top_label(&self) -> Option<&str> {
        self.sources.last().map(|s| s.label())
    }

    /// Open the whole-run recording sink.
    pub fn start_recording(&mut self, path: &Path) -> Result<()> {
        if let Some(mut old) = self.recording.take() {
            old.close()?;
        }
        self.recording = Some(FrameSink::create(path)?);
        info!("[REC] Recording to {}", path.display());
        Ok(())
    }

    /// Open a macro-capture sink. Only one capture can be open at a time.
    pub fn macro_start(&mut self, path: &Path) -> Result<()> {
        if let Some(active) = &self.capture {
            let err = Error::CaptureActive(active.path().to_path_buf());
            warn!("[MACRO] {err}");
            return Err(err);
        }
        self.capture = Some(FrameSink::create(path).inspect_err(|e| {
            warn!("[MACRO] Cannot capture to {}: {e}", path.display());
        })?);
        info!("[MACRO] Capturing to {}", path.display());
        Ok(())
    }

    /// Close the macro-capture sink if one is open.
    pub fn macro_end(&mut self) -> Result<()> {
        match self.capture.take() {
            Some(mut sink) => {
                sink.close()?;
            }
            None => debug!("[MACRO] No capture to end"),
        }
        Ok(())
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    /// Flush and close both sinks.
    pub fn close(&mut self) -> Result<()> {
        self.macro_end()?;
        if let Some(mut sink) = self.recording.take() {
            sink.close()?;
        }
        Ok(())
    }
}
