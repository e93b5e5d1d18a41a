//! Live controller source.
//!
//! Each pull re-polls the controller and encodes a fresh frame. The source
//! never exhausts; a disconnect surfaces as `Error::DeviceDisconnected`.

use gilrs::{Axis as PadAxis, Button as PadButton, EventType, GamepadId, Gilrs};
use tracing::{debug, info};

use super::{InputSource, Pull};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::input::{Button, ControllerSnapshot, DpadState};
use crate::profile::MappingProfile;

/// Anything that can report the controller's current state.
pub trait Gamepad {
    /// Drain pending backend events, then read the current state.
    fn snapshot(&mut self) -> Result<ControllerSnapshot>;

    fn name(&self) -> &str;
}

pub struct LiveSource<G> {
    pad: G,
    profile: MappingProfile,
    label: String,
}

impl<G: Gamepad> LiveSource<G> {
    pub fn new(pad: G, profile: MappingProfile) -> Self {
        let label = format!("live:{}", pad.name());
        Self { pad, profile, label }
    }
}

impl<G: Gamepad> InputSource for LiveSource<G> {
    fn pull(&mut self) -> Result<Pull> {
        let snapshot = self.pad.snapshot()?;
        Ok(Pull::Frame(Frame::encode(&snapshot, &self.profile).to_wire()))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Logical button -> gilrs button, by label (Xbox naming in gilrs).
///
/// gilrs has no capture button; Capture is never reported as pressed.
const PAD_BUTTONS: &[(Button, PadButton)] = &[
    (Button::Y, PadButton::North),
    (Button::B, PadButton::East),
    (Button::A, PadButton::South),
    (Button::X, PadButton::West),
    (Button::L, PadButton::LeftTrigger),
    (Button::R, PadButton::RightTrigger),
    (Button::ZL, PadButton::LeftTrigger2),
    (Button::ZR, PadButton::RightTrigger2),
    (Button::Minus, PadButton::Select),
    (Button::Plus, PadButton::Start),
    (Button::LClick, PadButton::LeftThumb),
    (Button::RClick, PadButton::RightThumb),
    (Button::Home, PadButton::Mode),
];

/// Controller read through gilrs.
pub struct GilrsPad {
    gilrs: Gilrs,
    id: GamepadId,
    name: String,
}

/// Connected controllers as (index, name), in enumeration order.
pub fn list_controllers() -> Result<Vec<(usize, String)>> {
    let gilrs = open_backend()?;
    Ok(gilrs
        .gamepads()
        .enumerate()
        .map(|(n, (_, pad))| (n, pad.name().to_string()))
        .collect())
}

fn open_backend() -> Result<Gilrs> {
    Gilrs::new().map_err(|e| Error::Gamepad(e.to_string()))
}

impl GilrsPad {
    /// Open a controller by enumeration index or exact name.
    pub fn open(selector: &str) -> Result<Self> {
        let gilrs = open_backend()?;

        let found = match selector.parse::<usize>() {
            Ok(index) => gilrs.gamepads().nth(index),
            Err(_) => gilrs.gamepads().find(|(_, pad)| pad.name() == selector),
        };
        let (id, name) = found
            .map(|(id, pad)| (id, pad.name().to_string()))
            .ok_or_else(|| Error::DeviceNotFound(selector.to_string()))?;

        info!("[PAD] Using \"{name}\" for input.");
        Ok(Self { gilrs, id, name })
    }

    fn drain_events(&mut self) -> Result<()> {
        while let Some(event) = self.gilrs.next_event() {
            if event.id != self.id {
                continue;
            }
            match event.event {
                EventType::Disconnected => {
                    return Err(Error::DeviceDisconnected(self.name.clone()));
                }
                other => debug!("[PAD] {other:?}"),
            }
        }
        Ok(())
    }
}

fn to_raw(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl Gamepad for GilrsPad {
    fn snapshot(&mut self) -> Result<ControllerSnapshot> {
        self.drain_events()?;

        let pad = self.gilrs.gamepad(self.id);
        if !pad.is_connected() {
            return Err(Error::DeviceDisconnected(self.name.clone()));
        }

        let mut snapshot = ControllerSnapshot {
            dpad: DpadState {
                up: pad.is_pressed(PadButton::DPadUp),
                right: pad.is_pressed(PadButton::DPadRight),
                down: pad.is_pressed(PadButton::DPadDown),
                left: pad.is_pressed(PadButton::DPadLeft),
            },
            lx: to_raw(pad.value(PadAxis::LeftStickX)),
            // gilrs reports up as positive; the receiver wants up as low
            ly: to_raw(-pad.value(PadAxis::LeftStickY)),
            rx: to_raw(pad.value(PadAxis::RightStickX)),
            ry: to_raw(-pad.value(PadAxis::RightStickY)),
            ..Default::default()
        };
        for &(btn, pad_btn) in PAD_BUTTONS {
            snapshot.buttons.set(btn, pad.is_pressed(pad_btn));
        }
        let trigger = |b: PadButton| pad.button_data(b).map(|d| to_raw(d.value())).unwrap_or(0);
        snapshot.left_trigger = trigger(PadButton::LeftTrigger2);
        snapshot.right_trigger = trigger(PadButton::RightTrigger2);

        Ok(snapshot)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
