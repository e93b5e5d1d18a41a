//! Receiver mapping profile.
//!
//! Describes which logical buttons land on which output bits, which axis
//! fills which frame slot, and how the D-pad folds into a hat code. One
//! profile exists per receiver firmware; it is passed to the codec by value
//! so several profiles can coexist.

use crate::input::{Axis, Button, Direction, DpadState, Trigger};

/// Hat code meaning "no direction".
pub const HAT_CENTER: u8 = 8;

/// Hat code for every 4-bit D-pad combination (bit order Up, Right, Down, Left).
///
/// Opposite pairs, three or four directions and "none" all map to centered.
pub const HAT_CODES: [u8; 16] = [
    HAT_CENTER, // ----
    0,          // U
    2,          // R
    1,          // U R
    4,          // D
    HAT_CENTER, // U D
    3,          // R D
    HAT_CENTER, // U R D
    6,          // L
    7,          // U L
    HAT_CENTER, // R L
    HAT_CENTER, // U R L
    5,          // D L
    HAT_CENTER, // U D L
    HAT_CENTER, // R D L
    HAT_CENTER, // U R D L
];

/// Button -> output bit, Switch Pro receiver.
const SWITCH_BUTTONS: &[(Button, u8)] = &[
    (Button::Y, 0),
    (Button::B, 1),
    (Button::A, 2),
    (Button::X, 3),
    (Button::L, 4),
    (Button::R, 5),
    (Button::ZL, 6),
    (Button::ZR, 7),
    (Button::Minus, 8),
    (Button::Plus, 9),
    (Button::LClick, 10),
    (Button::RClick, 11),
    (Button::Home, 12),
    (Button::Capture, 13),
];

/// Analog triggers fold into the ZL/ZR bits.
const SWITCH_TRIGGERS: &[(Trigger, u8)] = &[(Trigger::Left, 6), (Trigger::Right, 7)];

const SWITCH_AXES: [(Axis, usize); 4] = [(Axis::LX, 0), (Axis::LY, 1), (Axis::RX, 2), (Axis::RY, 3)];

const SWITCH_DPAD: [(Direction, u8); 4] = [
    (Direction::Up, 0),
    (Direction::Right, 1),
    (Direction::Down, 2),
    (Direction::Left, 3),
];

/// When an analog trigger counts as pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Pressed when the magnitude exceeds the threshold.
    Threshold(u16),
    /// Pressed on any nonzero reading.
    Nonzero,
}

impl TriggerPolicy {
    pub fn pressed(self, magnitude: i16) -> bool {
        match self {
            TriggerPolicy::Threshold(t) => magnitude.unsigned_abs() > t,
            TriggerPolicy::Nonzero => magnitude != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingProfile {
    pub name: &'static str,
    pub buttons: &'static [(Button, u8)],
    pub triggers: &'static [(Trigger, u8)],
    pub axes: [(Axis, usize); 4],
    pub dpad: [(Direction, u8); 4],
    pub hat_codes: [u8; 16],
    /// Raw stick readings with magnitude below this are centered.
    pub deadzone: u16,
    pub trigger: TriggerPolicy,
}

impl MappingProfile {
    /// Switch Pro receiver, narrow deadzone, threshold triggers.
    pub fn switch_pro() -> Self {
        Self {
            name: "switch-pro",
            buttons: SWITCH_BUTTONS,
            triggers: SWITCH_TRIGGERS,
            axes: SWITCH_AXES,
            dpad: SWITCH_DPAD,
            hat_codes: HAT_CODES,
            deadzone: 1000,
            trigger: TriggerPolicy::Threshold(1000),
        }
    }

    /// Switch Pro receiver, wide deadzone, any-nonzero triggers.
    pub fn switch_pro_wide() -> Self {
        Self {
            name: "switch-pro-wide",
            deadzone: 10000,
            trigger: TriggerPolicy::Nonzero,
            ..Self::switch_pro()
        }
    }

    pub fn with_deadzone(mut self, deadzone: u16) -> Self {
        self.deadzone = deadzone;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerPolicy) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn button_bit(&self, btn: Button) -> Option<u8> {
        self.buttons
            .iter()
            .find(|(b, _)| *b == btn)
            .map(|(_, bit)| *bit)
    }

    /// OR of the output bits for every listed button. Unmapped buttons are skipped.
    pub fn button_mask<I: IntoIterator<Item = Button>>(&self, buttons: I) -> u16 {
        buttons
            .into_iter()
            .filter_map(|btn| self.button_bit(btn))
            .fold(0, |acc, bit| acc | (1 << bit))
    }

    /// Index into the hat table for a D-pad state.
    pub fn dpad_index(&self, dpad: &DpadState) -> usize {
        self.dpad
            .iter()
            .filter(|(dir, _)| dpad.get(*dir))
            .fold(0, |acc, (_, bit)| acc | (1 << bit))
    }

    pub fn hat_for(&self, dpad: &DpadState) -> u8 {
        self.hat_codes[self.dpad_index(dpad) & 0x0F]
    }
}

impl Default for MappingProfile {
    fn default() -> Self {
        Self::switch_pro()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hat_table_is_total() {
        let profile = MappingProfile::switch_pro();
        for combo in 0..16usize {
            let dpad: DpadState = Direction::ALL
                .into_iter()
                .filter(|d| combo & (1 << (*d as usize)) != 0)
                .collect();
            let hat = profile.hat_for(&dpad);
            assert!(hat <= HAT_CENTER, "combo {combo:#06b} gave hat {hat}");
        }
    }

    #[test]
    fn test_opposite_directions_center() {
        let profile = MappingProfile::switch_pro();
        let up_down: DpadState = [Direction::Up, Direction::Down].into_iter().collect();
        let left_right: DpadState = [Direction::Left, Direction::Right].into_iter().collect();
        assert_eq!(profile.hat_for(&up_down), HAT_CENTER);
        assert_eq!(profile.hat_for(&left_right), HAT_CENTER);
        assert_eq!(profile.hat_for(&DpadState::default()), HAT_CENTER);
    }

    #[test]
    fn test_compass_hat_codes() {
        let profile = MappingProfile::switch_pro();
        let cases: [(&[Direction], u8); 8] = [
            (&[Direction::Up], 0),
            (&[Direction::Up, Direction::Right], 1),
            (&[Direction::Right], 2),
            (&[Direction::Right, Direction::Down], 3),
            (&[Direction::Down], 4),
            (&[Direction::Down, Direction::Left], 5),
            (&[Direction::Left], 6),
            (&[Direction::Left, Direction::Up], 7),
        ];
        for (dirs, expected) in cases {
            let dpad: DpadState = dirs.iter().copied().collect();
            assert_eq!(profile.hat_for(&dpad), expected, "{dirs:?}");
        }
    }

    #[test]
    fn test_button_mask() {
        let profile = MappingProfile::switch_pro();
        assert_eq!(profile.button_mask([Button::A]), 0x0004);
        assert_eq!(profile.button_mask([Button::Y, Button::Capture]), 0x2001);
        assert_eq!(profile.button_mask([]), 0);
    }

    #[test]
    fn test_trigger_policies() {
        assert!(!TriggerPolicy::Threshold(1000).pressed(1000));
        assert!(TriggerPolicy::Threshold(1000).pressed(1001));
        assert!(TriggerPolicy::Threshold(1000).pressed(-2000));
        assert!(TriggerPolicy::Nonzero.pressed(1));
        assert!(!TriggerPolicy::Nonzero.pressed(0));
    }

    #[test]
    fn test_presets_share_tables() {
        let narrow = MappingProfile::switch_pro();
        let wide = MappingProfile::switch_pro_wide();
        assert_eq!(narrow.deadzone, 1000);
        assert_eq!(wide.deadzone, 10000);
        assert_eq!(wide.trigger, TriggerPolicy::Nonzero);
        assert_eq!(narrow.buttons, wide.buttons);
        assert_eq!(narrow.hat_codes, wide.hat_codes);
    }
}
