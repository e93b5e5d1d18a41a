//! nx-TAS script -> playback file conversion.
//!
//! Script lines look like:
//!   `<frame> <KEY_A;KEY_DUP|NONE> <lx;ly> <rx;ry>`
//! Stick fields are optional and ignored. Frames missing from the script
//! are filled with the neutral frame.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::input::{Button, ControllerSnapshot, Direction};
use crate::profile::MappingProfile;

/// One script entry: what is held on a given frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TasStep {
    pub buttons: Vec<Button>,
    pub dpad: Vec<Direction>,
}

enum Key {
    Button(Button),
    Dpad(Direction),
}

fn key(name: &str) -> Option<Key> {
    let key = match name {
        "KEY_A" => Key::Button(Button::A),
        "KEY_B" => Key::Button(Button::B),
        "KEY_X" => Key::Button(Button::X),
        "KEY_Y" => Key::Button(Button::Y),
        "KEY_L" => Key::Button(Button::L),
        "KEY_R" => Key::Button(Button::R),
        "KEY_ZL" => Key::Button(Button::ZL),
        "KEY_ZR" => Key::Button(Button::ZR),
        "KEY_PLUS" => Key::Button(Button::Plus),
        "KEY_MINUS" => Key::Button(Button::Minus),
        "KEY_LSTICK" => Key::Button(Button::LClick),
        "KEY_RSTICK" => Key::Button(Button::RClick),
        "KEY_HOME" => Key::Button(Button::Home),
        "KEY_CAPTURE" => Key::Button(Button::Capture),
        "KEY_DUP" => Key::Dpad(Direction::Up),
        "KEY_DDOWN" => Key::Dpad(Direction::Down),
        "KEY_DLEFT" => Key::Dpad(Direction::Left),
        "KEY_DRIGHT" => Key::Dpad(Direction::Right),
        _ => return None,
    };
    Some(key)
}

fn parse_line(line: &str) -> std::result::Result<(u32, TasStep), String> {
    let mut fields = line.split_whitespace();
    let index = fields
        .next()
        .ok_or("empty line")?
        .parse::<u32>()
        .map_err(|e| format!("bad frame number: {e}"))?;
    let keys = fields.next().ok_or("missing key field")?;

    let mut step = TasStep::default();
    if keys != "NONE" {
        for name in keys.split(';').filter(|k| !k.is_empty()) {
            match key(name) {
                Some(Key::Button(btn)) => step.buttons.push(btn),
                Some(Key::Dpad(dir)) => step.dpad.push(dir),
                None => return Err(format!("unknown key {name:?}")),
            }
        }
    }
    Ok((index, step))
}

/// Parse a whole script. Blank lines and `#` comments are skipped; bad lines
/// are logged and skipped. A repeated frame number keeps the last entry.
pub fn parse_tas(text: &str) -> BTreeMap<u32, TasStep> {
    let mut steps = BTreeMap::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok((index, step)) => {
                steps.insert(index, step);
            }
            Err(e) => warn!("[TAS] Line {}: {e}, skipped", n + 1),
        }
    }
    steps
}

/// Lazily expand parsed steps into a dense frame sequence `0..=max`.
pub fn render<'a>(
    steps: &'a BTreeMap<u32, TasStep>,
    profile: &'a MappingProfile,
) -> impl Iterator<Item = Frame> + 'a {
    let count = steps.keys().next_back().map_or(0, |&last| u64::from(last) + 1);
    (0..count).map(move |i| {
        // i < count <= u32::MAX + 1
        match steps.get(&(i as u32)) {
            Some(step) => {
                let snapshot = ControllerSnapshot {
                    buttons: step.buttons.iter().copied().collect(),
                    dpad: step.dpad.iter().copied().collect(),
                    ..Default::default()
                };
                Frame::encode(&snapshot, profile)
            }
            None => Frame::NEUTRAL,
        }
    })
}

/// Convert a script file into a playback file. Returns the frame count.
pub fn convert_tas(input: &Path, output: &Path, profile: &MappingProfile) -> Result<u64> {
    let text = fs::read_to_string(input).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::FileNotFound(input.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let steps = parse_tas(&text);

    let mut out = BufWriter::new(File::create(output)?);
    let mut written = 0u64;
    for frame in render(&steps, profile) {
        out.write_all(frame.to_wire().as_bytes())?;
        written += 1;
    }
    out.flush()?;

    info!(
        "[TAS] Wrote {} frames from {} to {}",
        written,
        input.display(),
        output.display()
    );
    Ok(written)
}
