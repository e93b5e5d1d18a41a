//! Frame producers that can sit on the input stack.

pub mod live;
pub mod playback;
pub mod procedural;

use crate::error::Result;
use crate::frame::WireLine;

pub use live::LiveSource;
pub use playback::FilePlayback;
pub use procedural::{CircleSweep, EventScript, ScriptEvent, Stick};

/// Outcome of one pull from a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    Frame(WireLine),
    /// The source has nothing more to give and should be dropped.
    Exhausted,
}

pub trait InputSource {
    fn pull(&mut self) -> Result<Pull>;

    /// Short name for log lines.
    fn label(&self) -> &str;
}

impl<S: InputSource + ?Sized> InputSource for Box<S> {
    fn pull(&mut self) -> Result<Pull> {
        (**self).pull()
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}
