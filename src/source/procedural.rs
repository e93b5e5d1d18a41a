//! Procedural macro sources: frames computed from a frame counter.

use std::f64::consts::TAU;

use serde::Deserialize;

use super::{InputSource, Pull};
use crate::error::Result;
use crate::frame::{Frame, STICK_CENTER};
use crate::input::{Button, Direction, DpadState};
use crate::profile::MappingProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stick {
    Left,
    Right,
}

/// Full-circle sweep of one stick, `period` frames per revolution.
pub struct CircleSweep {
    stick: Stick,
    period: u32,
    total: u32,
    radius: f64,
    index: u32,
}

impl CircleSweep {
    pub fn new(stick: Stick, period: u32, cycles: u32, radius: u8) -> Self {
        let period = period.max(1);
        Self {
            stick,
            period,
            total: period.saturating_mul(cycles),
            radius: f64::from(radius.min(127)),
            index: 0,
        }
    }

    fn frame_at(&self, index: u32) -> Frame {
        let angle = TAU * f64::from(index % self.period) / f64::from(self.period);
        let x = (f64::from(STICK_CENTER) + self.radius * angle.cos()).round() as u8;
        let y = (f64::from(STICK_CENTER) + self.radius * angle.sin()).round() as u8;
        match self.stick {
            Stick::Left => Frame { lx: x, ly: y, ..Frame::NEUTRAL },
            Stick::Right => Frame { rx: x, ry: y, ..Frame::NEUTRAL },
        }
    }
}

impl InputSource for CircleSweep {
    fn pull(&mut self) -> Result<Pull> {
        if self.index >= self.total {
            return Ok(Pull::Exhausted);
        }
        let frame = self.frame_at(self.index);
        self.index += 1;
        Ok(Pull::Frame(frame.to_wire()))
    }

    fn label(&self) -> &str {
        "circle"
    }
}

/// One scripted press: `hold` frames pressed, then `release` neutral frames,
/// the whole pair emitted `repeat` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEvent {
    pub buttons: Vec<Button>,
    pub dpad: Vec<Direction>,
    pub hold: u32,
    pub release: u32,
    pub repeat: u32,
}

impl ScriptEvent {
    fn period(&self) -> u64 {
        u64::from(self.hold) + u64::from(self.release)
    }

    fn span(&self) -> u64 {
        self.period() * u64::from(self.repeat)
    }
}

/// Replays a list of [`ScriptEvent`]s with explicit hold/repeat counts.
pub struct EventScript {
    events: Vec<(Frame, ScriptEvent)>,
    event: usize,
    step: u64,
}

impl EventScript {
    pub fn new(events: Vec<ScriptEvent>, profile: &MappingProfile) -> Self {
        let events = events
            .into_iter()
            .map(|ev| {
                let dpad: DpadState = ev.dpad.iter().copied().collect();
                let pressed = Frame {
                    hat: profile.hat_for(&dpad),
                    buttons: profile.button_mask(ev.buttons.iter().copied()),
                    ..Frame::NEUTRAL
                };
                (pressed, ev)
            })
            .collect();
        Self {
            events,
            event: 0,
            step: 0,
        }
    }

    /// Frames this script emits in total.
    pub fn frame_count(&self) -> u64 {
        self.events.iter().map(|(_, ev)| ev.span()).sum()
    }
}

impl InputSource for EventScript {
    fn pull(&mut self) -> Result<Pull> {
        while let Some((pressed, ev)) = self.events.get(self.event) {
            if self.step >= ev.span() {
                self.event += 1;
                self.step = 0;
                continue;
            }
            let phase = self.step % ev.period();
            let frame = if phase < u64::from(ev.hold) {
                *pressed
            } else {
                Frame::NEUTRAL
            };
            self.step += 1;
            return Ok(Pull::Frame(frame.to_wire()));
        }
        Ok(Pull::Exhausted)
    }

    fn label(&self) -> &str {
        "script"
    }
}
