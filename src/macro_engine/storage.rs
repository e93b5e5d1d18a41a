//! Macro definitions: JSON file loading and capture file naming.
//!
//! Definition file format:
//! ```json
//! {
//!   "capture": { "start": ["L", "Up"], "stop": ["L", "Down"], "dir": "captures" },
//!   "bindings": [
//!     { "chord": ["Capture", "A"], "source": { "kind": "playback", "path": "intro.txt" } },
//!     { "chord": ["Capture", "B"], "source": { "kind": "circle", "stick": "left", "period": 60, "cycles": 2 } },
//!     { "chord": ["Capture", "X"], "source": { "kind": "script", "events": [
//!         { "buttons": ["A"], "hold": 5, "release": 5, "repeat": 10 }
//!     ] } }
//!   ]
//! }
//! ```
//! Relative paths are resolved against the definition file's directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::combo::Chord;
use crate::error::{Error, Result};
use crate::input::{Button, Direction};
use crate::profile::MappingProfile;
use crate::source::{CircleSweep, EventScript, FilePlayback, InputSource, ScriptEvent, Stick};

const CAPTURE_SUFFIX: &str = "_capture.txt";

#[derive(Debug, Clone, Deserialize)]
struct MacroFile {
    #[serde(default)]
    capture: Option<CaptureDef>,
    #[serde(default)]
    bindings: Vec<BindingDef>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptureDef {
    start: Vec<String>,
    stop: Vec<String>,
    #[serde(default)]
    dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct BindingDef {
    chord: Vec<String>,
    source: SourceDef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum SourceDef {
    Playback {
        path: PathBuf,
    },
    Circle {
        stick: Stick,
        period: u32,
        #[serde(default = "one")]
        cycles: u32,
        #[serde(default = "full_radius")]
        radius: u8,
    },
    Script {
        events: Vec<EventDef>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct EventDef {
    #[serde(default)]
    buttons: Vec<String>,
    #[serde(default)]
    dpad: Vec<String>,
    hold: u32,
    #[serde(default)]
    release: u32,
    #[serde(default = "one")]
    repeat: u32,
}

fn one() -> u32 {
    1
}

fn full_radius() -> u8 {
    127
}

/// A resolved macro that can be instantiated any number of times.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroSpec {
    Playback(PathBuf),
    Circle {
        stick: Stick,
        period: u32,
        cycles: u32,
        radius: u8,
    },
    Script(Vec<ScriptEvent>),
}

impl MacroSpec {
    /// Build a fresh source starting from its first frame.
    pub fn build(&self, profile: &MappingProfile) -> Box<dyn InputSource> {
        match self {
            MacroSpec::Playback(path) => Box::new(FilePlayback::open(path)),
            MacroSpec::Circle {
                stick,
                period,
                cycles,
                radius,
            } => Box::new(CircleSweep::new(*stick, *period, *cycles, *radius)),
            MacroSpec::Script(events) => {
                let script = EventScript::new(events.clone(), profile);
                debug!("[MACRO] Script of {} frames", script.frame_count());
                Box::new(script)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub start: Chord,
    pub stop: Chord,
    pub dir: PathBuf,
}

/// Compiled macro definitions: capture chords plus chord -> macro bindings.
#[derive(Debug, Clone)]
pub struct MacroSet {
    pub capture: CaptureSettings,
    pub bindings: Vec<(Chord, MacroSpec)>,
}

impl MacroSet {
    /// L+Up starts a capture, L+Down stops it, captures land in `dir`.
    pub fn defaults(profile: &MappingProfile, dir: &Path) -> Result<Self> {
        Ok(Self {
            capture: CaptureSettings {
                start: Chord::parse(&["L", "Up"], profile)?,
                stop: Chord::parse(&["L", "Down"], profile)?,
                dir: capture_dir(dir)?,
            },
            bindings: Vec::new(),
        })
    }
}

/// Capture files are created on demand, so the directory must already exist.
fn capture_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "capture directory {} does not exist",
            dir.display()
        )));
    }
    Ok(dir.to_path_buf())
}

/// Load and validate a macro definition file.
pub fn load_macros(path: &Path, profile: &MappingProfile) -> Result<MacroSet> {
    let data = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let file: MacroFile = serde_json::from_str(&data)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };

    let mut set = MacroSet::defaults(profile, base)?;
    if let Some(capture) = file.capture {
        set.capture = CaptureSettings {
            start: Chord::parse(&capture.start, profile)?,
            stop: Chord::parse(&capture.stop, profile)?,
            dir: capture_dir(
                &capture
                    .dir
                    .as_deref()
                    .map(resolve)
                    .unwrap_or_else(|| base.to_path_buf()),
            )?,
        };
    }

    for binding in file.bindings {
        let chord = Chord::parse(&binding.chord, profile)?;
        let spec = match binding.source {
            SourceDef::Playback { path } => MacroSpec::Playback(resolve(&path)),
            SourceDef::Circle {
                stick,
                period,
                cycles,
                radius,
            } => MacroSpec::Circle {
                stick,
                period,
                cycles,
                radius,
            },
            SourceDef::Script { events } => MacroSpec::Script(
                events
                    .into_iter()
                    .map(compile_event)
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        set.bindings.push((chord, spec));
    }

    info!(
        "[MACRO] Loaded {} binding(s) from {}",
        set.bindings.len(),
        path.display()
    );
    Ok(set)
}

fn compile_event(def: EventDef) -> Result<ScriptEvent> {
    let buttons = def
        .buttons
        .iter()
        .map(|name| {
            Button::from_name(name).ok_or_else(|| Error::Config(format!("unknown button {name:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    let dpad = def
        .dpad
        .iter()
        .map(|name| {
            Direction::from_name(name)
                .ok_or_else(|| Error::Config(format!("unknown direction {name:?}")))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(ScriptEvent {
        buttons,
        dpad,
        hold: def.hold,
        release: def.release,
        repeat: def.repeat,
    })
}

fn capture_id(name: &str) -> Option<u32> {
    name.strip_suffix(CAPTURE_SUFFIX)?.parse().ok()
}

/// Next free `NNN_capture.txt` path in `dir`.
pub fn next_capture_path(dir: &Path) -> PathBuf {
    let id = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| capture_id(&e.file_name().to_string_lossy()))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0)
        + 1;
    dir.join(format!("{id:03}{CAPTURE_SUFFIX}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::source::Pull;
    use tempfile::TempDir;

    fn write_defs(dir: &TempDir, json: &str) -> PathBuf {
        let path = dir.path().join("macros.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_load_full_definition() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("caps")).unwrap();
        let path = write_defs(
            &dir,
            r#"{
                "capture": { "start": ["ZL", "Left"], "stop": ["ZL", "Right"], "dir": "caps" },
                "bindings": [
                    { "chord": ["Capture", "A"], "source": { "kind": "playback", "path": "intro.txt" } },
                    { "chord": ["Capture", "B"], "source": { "kind": "circle", "stick": "right", "period": 30 } },
                    { "chord": ["Home", "Down"], "source": { "kind": "script", "events": [
                        { "buttons": ["A", "B"], "dpad": ["Up"], "hold": 3 }
                    ] } }
                ]
            }"#,
        );
        let profile = MappingProfile::switch_pro();
        let set = load_macros(&path, &profile).unwrap();

        assert_eq!(set.capture.dir, dir.path().join("caps"));
        assert_eq!(set.capture.start.hat, Some(6));
        assert_eq!(set.bindings.len(), 3);
        assert_eq!(set.bindings[0].1, MacroSpec::Playback(dir.path().join("intro.txt")));
        assert_eq!(
            set.bindings[1].1,
            MacroSpec::Circle {
                stick: Stick::Right,
                period: 30,
                cycles: 1,
                radius: 127
            }
        );
        match &set.bindings[2].1 {
            MacroSpec::Script(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].buttons, vec![Button::A, Button::B]);
                assert_eq!((events[0].hold, events[0].release, events[0].repeat), (3, 0, 1));
            }
            other => panic!("expected script, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_without_capture_section() {
        let dir = TempDir::new().unwrap();
        let path = write_defs(&dir, r#"{ "bindings": [] }"#);
        let set = load_macros(&path, &MappingProfile::switch_pro()).unwrap();
        assert_eq!(set.capture.dir, dir.path());
        assert_eq!(set.capture.start.hat, Some(0));
        assert_eq!(set.capture.stop.hat, Some(4));
        assert!(set.bindings.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let profile = MappingProfile::switch_pro();

        let missing = dir.path().join("none.json");
        assert!(matches!(load_macros(&missing, &profile), Err(Error::FileNotFound(_))));

        let bad_json = write_defs(&dir, "{ not json");
        assert!(matches!(load_macros(&bad_json, &profile), Err(Error::Config(_))));

        let bad_button = write_defs(
            &dir,
            r#"{ "bindings": [ { "chord": ["A"], "source": { "kind": "script", "events": [ { "buttons": ["Turbo"], "hold": 1 } ] } } ] }"#,
        );
        assert!(matches!(load_macros(&bad_button, &profile), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_capture_dir_is_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let profile = MappingProfile::switch_pro();
        let path = write_defs(
            &dir,
            r#"{ "capture": { "start": ["L", "Up"], "stop": ["L", "Down"], "dir": "gone" } }"#,
        );
        assert!(matches!(load_macros(&path, &profile), Err(Error::Config(_))));
        assert!(matches!(
            MacroSet::defaults(&profile, &dir.path().join("gone")),
            Err(Error::Config(_))
        ));

        fs::create_dir(dir.path().join("gone")).unwrap();
        let set = load_macros(&path, &profile).unwrap();
        assert_eq!(set.capture.dir, dir.path().join("gone"));
    }

    #[test]
    fn test_build_script_source() {
        let profile = MappingProfile::switch_pro();
        let spec = MacroSpec::Script(vec![ScriptEvent {
            buttons: vec![Button::X],
            dpad: vec![],
            hold: 1,
            release: 0,
            repeat: 1,
        }]);
        let mut source = spec.build(&profile);
        let Pull::Frame(line) = source.pull().unwrap() else {
            panic!("script exhausted early");
        };
        assert_eq!(line.decode().unwrap(), Frame { buttons: 1 << 3, ..Frame::NEUTRAL });
        assert_eq!(source.pull().unwrap(), Pull::Exhausted);
    }

    #[test]
    fn test_next_capture_path() {
        let dir = TempDir::new().unwrap();
        assert_eq!(next_capture_path(dir.path()), dir.path().join("001_capture.txt"));

        fs::write(dir.path().join("001_capture.txt"), "").unwrap();
        fs::write(dir.path().join("007_capture.txt"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        assert_eq!(next_capture_path(dir.path()), dir.path().join("008_capture.txt"));
    }
}
