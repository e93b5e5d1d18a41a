//! Macro controller.
//!
//! Owns the input stack and watches every frame leaving it. While only the
//! baseline sources are active, chords on those frames push bound macros or
//! open/close a macro capture. Frames produced by a running macro are never
//! inspected, so a macro cannot retrigger itself.

use std::path::PathBuf;

use tracing::{info, warn};

use super::storage::{self, MacroSet, MacroSpec};
use crate::combo::{ComboAction, ComboDetector};
use crate::error::Result;
use crate::profile::MappingProfile;
use crate::source::Pull;
use crate::stack::InputStack;
use crate::transport::FrameFeed;

pub struct MacroController {
    stack: InputStack,
    detector: ComboDetector,
    bindings: Vec<MacroSpec>,
    capture_dir: PathBuf,
    profile: MappingProfile,
    /// Stack depth at or below which no macro is running.
    baseline: usize,
}

impl MacroController {
    /// Wrap a stack whose current contents are the baseline.
    pub fn new(stack: InputStack, macros: MacroSet, profile: MappingProfile) -> Self {
        let mut chords = vec![
            (macros.capture.start, ComboAction::StartCapture),
            (macros.capture.stop, ComboAction::StopCapture),
        ];
        let mut bindings = Vec::with_capacity(macros.bindings.len());
        for (i, (chord, spec)) in macros.bindings.into_iter().enumerate() {
            chords.push((chord, ComboAction::Play(i)));
            bindings.push(spec);
        }

        Self {
            baseline: stack.depth(),
            stack,
            detector: ComboDetector::new(chords),
            bindings,
            capture_dir: macros.capture.dir,
            profile,
        }
    }

    pub fn stack(&self) -> &InputStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut InputStack {
        &mut self.stack
    }

    /// Whether a pushed macro currently owns the output.
    pub fn macro_running(&self) -> bool {
        self.stack.depth() > self.baseline
    }

    /// Execute a chord action against the stack.
    pub fn execute(&mut self, action: ComboAction) -> Result<()> {
        match action {
            ComboAction::None => {}
            ComboAction::StartCapture => {
                if self.stack.is_capturing() {
                    warn!("[MACRO] Capture already running, ignoring start chord");
                } else {
                    let path = storage::next_capture_path(&self.capture_dir);
                    // failures are logged by the stack; capture stays off
                    let _ = self.stack.macro_start(&path);
                }
            }
            ComboAction::StopCapture => self.stack.macro_end()?,
            ComboAction::Play(index) => {
                if let Some(spec) = self.bindings.get(index) {
                    info!("[MACRO] Chord {index} fired");
                    self.stack.push(spec.build(&self.profile));
                    self.detector.reset();
                }
            }
        }
        Ok(())
    }

    /// Flush and close the recording and capture sinks.
    pub fn close(&mut self) -> Result<()> {
        self.stack.close()
    }
}

impl FrameFeed for MacroController {
    fn next_frame(&mut self) -> Result<Pull> {
        let pull = self.stack.pull()?;
        if let Pull::Frame(line) = &pull {
            let depth = self.stack.depth();
            if depth <= self.baseline {
                // baseline sources may have exhausted underneath
                self.baseline = depth;
                let action = self.detector.update(line.decode().as_ref());
                self.execute(action)?;
            }
        }
        Ok(pull)
    }
}
