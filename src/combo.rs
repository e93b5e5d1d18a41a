//! Chord detection on outgoing frames.
//!
//! Chords are button/D-pad combinations bound to macro actions. Detection
//! is edge-triggered: an action fires on the first frame a chord is held,
//! and not again until the chord is released.

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::input::{Button, Direction, DpadState};
use crate::profile::{MappingProfile, HAT_CENTER};

/// Action triggered by a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboAction {
    None,
    StartCapture,
    StopCapture,
    /// Push the macro binding at this index.
    Play(usize),
}

/// Buttons that must all be held, plus an optional exact hat code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chord {
    pub buttons: u16,
    pub hat: Option<u8>,
}

impl Chord {
    /// Build a chord from button and direction names, e.g. `["L", "Up"]`.
    pub fn parse<S: AsRef<str>>(tokens: &[S], profile: &MappingProfile) -> Result<Chord> {
        let mut buttons = Vec::new();
        let mut dpad = DpadState::default();
        let mut any_dir = false;
        for token in tokens {
            let token = token.as_ref();
            if let Some(btn) = Button::from_name(token) {
                buttons.push(btn);
            } else if let Some(dir) = Direction::from_name(token) {
                dpad.set(dir, true);
                any_dir = true;
            } else {
                return Err(Error::Config(format!("unknown chord token {token:?}")));
            }
        }

        let hat = if any_dir {
            let hat = profile.hat_for(&dpad);
            if hat == HAT_CENTER {
                return Err(Error::Config(format!(
                    "chord {:?} has no single hat direction",
                    tokens.iter().map(|t| t.as_ref()).collect::<Vec<_>>()
                )));
            }
            Some(hat)
        } else {
            None
        };
        let chord = Chord {
            buttons: profile.button_mask(buttons),
            hat,
        };
        if chord.buttons == 0 && chord.hat.is_none() {
            return Err(Error::Config("empty chord".into()));
        }
        Ok(chord)
    }

    pub fn matches(&self, frame: &Frame) -> bool {
        frame.buttons & self.buttons == self.buttons && self.hat.map_or(true, |h| frame.hat == h)
    }

    fn specificity(&self) -> u32 {
        self.buttons.count_ones() + u32::from(self.hat.is_some())
    }
}

/// Combo detector state machine.
pub struct ComboDetector {
    chords: Vec<(Chord, ComboAction)>,
    held: Vec<bool>,
}

impl ComboDetector {
    pub fn new(chords: Vec<(Chord, ComboAction)>) -> Self {
        let held = vec![false; chords.len()];
        Self { chords, held }
    }

    /// Feed one outgoing frame. `None` (an undecodable line) releases every chord.
    ///
    /// When several chords start on the same frame the most specific wins.
    pub fn update(&mut self, frame: Option<&Frame>) -> ComboAction {
        let mut best: Option<(u32, ComboAction)> = None;
        for ((chord, action), held) in self.chords.iter().zip(self.held.iter_mut()) {
            let now = frame.is_some_and(|f| chord.matches(f));
            if now && !*held {
                let score = chord.specificity();
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, *action));
                }
            }
            *held = now;
        }
        best.map_or(ComboAction::None, |(_, action)| action)
    }

    /// Forget held state, e.g. after a macro took over the output.
    pub fn reset(&mut self) {
        self.held.iter_mut().for_each(|h| *h = false);
    }
}
