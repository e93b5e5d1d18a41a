//! Frame codec: controller snapshot -> receiver frame -> hex wire line.
//!
//! Frame layout (7 bytes, big-endian):
//!   [0]     = hat code (0-7 compass, 8 centered)
//!   [1..3]  = button bitfield (u16)
//!   [3]     = LX
//!   [4]     = LY
//!   [5]     = RX
//!   [6]     = RY
//!
//! On the wire each frame is the lowercase hex of those bytes followed by
//! `\n` (14 + 1 bytes). Axis bytes are unsigned with 128 as center.

use std::fmt;

use crate::input::ControllerSnapshot;
use crate::profile::{MappingProfile, HAT_CENTER};

pub const FRAME_LEN: usize = 7;
pub const WIRE_HEX_LEN: usize = FRAME_LEN * 2;
pub const STICK_CENTER: u8 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub hat: u8,
    pub buttons: u16,
    pub lx: u8,
    pub ly: u8,
    pub rx: u8,
    pub ry: u8,
}

impl Frame {
    /// Nothing pressed, sticks centered.
    pub const NEUTRAL: Frame = Frame {
        hat: HAT_CENTER,
        buttons: 0,
        lx: STICK_CENTER,
        ly: STICK_CENTER,
        rx: STICK_CENTER,
        ry: STICK_CENTER,
    };

    /// Encode one snapshot with the given profile.
    pub fn encode(snapshot: &ControllerSnapshot, profile: &MappingProfile) -> Frame {
        let mut buttons = profile.button_mask(
            profile
                .buttons
                .iter()
                .map(|&(btn, _)| btn)
                .filter(|&btn| snapshot.buttons.get(btn)),
        );
        for &(trigger, bit) in profile.triggers {
            if profile.trigger.pressed(snapshot.trigger(trigger)) {
                buttons |= 1 << bit;
            }
        }

        let mut axes = [STICK_CENTER; 4];
        for &(axis, slot) in &profile.axes {
            axes[slot] = quantize_axis(snapshot.axis(axis), profile.deadzone);
        }

        Frame {
            hat: profile.hat_for(&snapshot.dpad),
            buttons,
            lx: axes[0],
            ly: axes[1],
            rx: axes[2],
            ry: axes[3],
        }
    }

    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let [b_hi, b_lo] = self.buttons.to_be_bytes();
        [self.hat, b_hi, b_lo, self.lx, self.ly, self.rx, self.ry]
    }

    pub fn from_bytes(bytes: [u8; FRAME_LEN]) -> Frame {
        Frame {
            hat: bytes[0],
            buttons: u16::from_be_bytes([bytes[1], bytes[2]]),
            lx: bytes[3],
            ly: bytes[4],
            rx: bytes[5],
            ry: bytes[6],
        }
    }

    pub fn to_wire(&self) -> WireLine {
        let mut line = Vec::with_capacity(WIRE_HEX_LEN + 1);
        for byte in self.to_bytes() {
            line.push(HEX_DIGITS[(byte >> 4) as usize]);
            line.push(HEX_DIGITS[(byte & 0x0F) as usize]);
        }
        line.push(b'\n');
        WireLine(line)
    }

    /// Parse one wire line. Accepts either hex case and a trailing `\n` or `\r\n`.
    pub fn decode(line: &[u8]) -> Option<Frame> {
        let hex = trim_line_end(line);
        if hex.len() != WIRE_HEX_LEN {
            return None;
        }
        let mut bytes = [0u8; FRAME_LEN];
        for (i, pair) in hex.chunks_exact(2).enumerate() {
            bytes[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
        }
        Some(Frame::from_bytes(bytes))
    }
}

impl Default for Frame {
    fn default() -> Self {
        Frame::NEUTRAL
    }
}

/// Deadzone-clamp a signed 16-bit reading, then re-center it at 128.
pub fn quantize_axis(raw: i16, deadzone: u16) -> u8 {
    let raw = if raw.unsigned_abs() < deadzone { 0 } else { raw };
    ((raw >> 8) + 128) as u8
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// One newline-terminated line as it goes out on the link.
///
/// Lines built from a [`Frame`] are always well-formed. Lines read back from
/// playback files are trusted and forwarded verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct WireLine(Vec<u8>);

impl WireLine {
    /// Wrap raw line bytes, appending the terminator if missing.
    pub fn from_raw(raw: &[u8]) -> WireLine {
        let mut line = raw.to_vec();
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }
        WireLine(line)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn decode(&self) -> Option<Frame> {
        Frame::decode(&self.0)
    }
}

impl From<Frame> for WireLine {
    fn from(frame: Frame) -> Self {
        frame.to_wire()
    }
}

impl fmt::Debug for WireLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireLine({:?})", String::from_utf8_lossy(&self.0))
    }
}
