//! Controller snapshot types.
//!
//! A snapshot is what the gamepad backend reports for one polling cycle:
//!   - 14 logical buttons (Switch Pro layout names)
//!   - a 4-way D-pad
//!   - two sticks, signed 16-bit, centered at 0
//!   - two trigger magnitudes, signed 16-bit

/// Logical button names, in receiver output-bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Y,
    B,
    A,
    X,
    L,
    R,
    ZL,
    ZR,
    Minus,
    Plus,
    LClick,
    RClick,
    Home,
    Capture,
}

impl Button {
    #[cfg(test)]
    pub const ALL: [Button; 14] = [
        Button::Y,
        Button::B,
        Button::A,
        Button::X,
        Button::L,
        Button::R,
        Button::ZL,
        Button::ZR,
        Button::Minus,
        Button::Plus,
        Button::LClick,
        Button::RClick,
        Button::Home,
        Button::Capture,
    ];

    fn mask(self) -> u16 {
        1 << (self as u16)
    }

    /// Case-insensitive name lookup used by macro definitions.
    pub fn from_name(name: &str) -> Option<Button> {
        let btn = match name.to_ascii_lowercase().as_str() {
            "y" => Button::Y,
            "b" => Button::B,
            "a" => Button::A,
            "x" => Button::X,
            "l" => Button::L,
            "r" => Button::R,
            "zl" => Button::ZL,
            "zr" => Button::ZR,
            "minus" | "select" => Button::Minus,
            "plus" | "start" => Button::Plus,
            "lclick" | "lstick" | "l3" => Button::LClick,
            "rclick" | "rstick" | "r3" => Button::RClick,
            "home" => Button::Home,
            "capture" => Button::Capture,
            _ => return None,
        };
        Some(btn)
    }
}

/// Pressed state of every logical button, one bit per [`Button`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ButtonState {
    bits: u16,
}

impl ButtonState {
    pub fn get(&self, btn: Button) -> bool {
        self.bits & btn.mask() != 0
    }

    pub fn set(&mut self, btn: Button, val: bool) {
        if val {
            self.bits |= btn.mask();
        } else {
            self.bits &= !btn.mask();
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

impl FromIterator<Button> for ButtonState {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut state = ButtonState::default();
        for btn in iter {
            state.set(btn, true);
        }
        state
    }
}

/// D-pad directions, in hat-table bit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    #[cfg(test)]
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn from_name(name: &str) -> Option<Direction> {
        let dir = match name.to_ascii_lowercase().as_str() {
            "up" | "dup" => Direction::Up,
            "right" | "dright" => Direction::Right,
            "down" | "ddown" => Direction::Down,
            "left" | "dleft" => Direction::Left,
            _ => return None,
        };
        Some(dir)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DpadState {
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub left: bool,
}

impl DpadState {
    pub fn get(&self, dir: Direction) -> bool {
        match dir {
            Direction::Up => self.up,
            Direction::Right => self.right,
            Direction::Down => self.down,
            Direction::Left => self.left,
        }
    }

    pub fn set(&mut self, dir: Direction, val: bool) {
        match dir {
            Direction::Up => self.up = val,
            Direction::Right => self.right = val,
            Direction::Down => self.down = val,
            Direction::Left => self.left = val,
        }
    }
}

impl FromIterator<Direction> for DpadState {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut state = DpadState::default();
        for dir in iter {
            state.set(dir, true);
        }
        state
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    LX,
    LY,
    RX,
    RY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Left,
    Right,
}

/// One polling cycle of controller state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ControllerSnapshot {
    pub buttons: ButtonState,
    pub dpad: DpadState,
    pub lx: i16,
    pub ly: i16,
    pub rx: i16,
    pub ry: i16,
    pub left_trigger: i16,
    pub right_trigger: i16,
}

impl ControllerSnapshot {
    pub fn axis(&self, axis: Axis) -> i16 {
        match axis {
            Axis::LX => self.lx,
            Axis::LY => self.ly,
            Axis::RX => self.rx,
            Axis::RY => self.ry,
        }
    }

    pub fn trigger(&self, trigger: Trigger) -> i16 {
        match trigger {
            Trigger::Left => self.left_trigger,
            Trigger::Right => self.right_trigger,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_set_get_roundtrip() {
        let mut bs = ButtonState::default();
        for btn in Button::ALL {
            assert!(!bs.get(btn));
            bs.set(btn, true);
            assert!(bs.get(btn));
            bs.set(btn, false);
            assert!(!bs.get(btn));
        }
        assert!(bs.is_empty());
    }

    #[test]
    fn test_buttons_do_not_alias() {
        for btn in Button::ALL {
            let bs: ButtonState = [btn].into_iter().collect();
            for other in Button::ALL {
                if other != btn {
                    assert!(!bs.get(other), "Setting {btn:?} also set {other:?}");
                }
            }
        }
    }

    #[test]
    fn test_button_names() {
        assert_eq!(Button::from_name("A"), Some(Button::A));
        assert_eq!(Button::from_name("zr"), Some(Button::ZR));
        assert_eq!(Button::from_name("Select"), Some(Button::Minus));
        assert_eq!(Button::from_name("start"), Some(Button::Plus));
        assert_eq!(Button::from_name("LStick"), Some(Button::LClick));
        assert_eq!(Button::from_name("turbo"), None);
    }

    #[test]
    fn test_dpad_from_directions() {
        let dpad: DpadState = [Direction::Up, Direction::Left].into_iter().collect();
        assert!(dpad.up && dpad.left);
        assert!(!dpad.down && !dpad.right);
        assert_eq!(Direction::from_name("DDOWN"), Some(Direction::Down));
    }
}
