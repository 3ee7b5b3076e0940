// Input module - Keyboard and controller input
//
// Both sources are reduced to an `InputMask`, one bit per logical button.
// Bit meaning is per console: NES uses `NesButton` order, CHIP-8 bit n is
// hex key n.

pub mod config;
pub mod gamepad;
pub mod keyboard;
pub mod unified;

pub use config::InputConfig;
pub use gamepad::{ButtonSource, ControllerRegistry, GamepadEvent, GamepadHub, GamepadMapping};
pub use keyboard::{KeyboardHandler, KeyboardMapping};
pub use unified::InputAggregator;

use std::ops::{BitOr, BitOrAssign};

/// Bitmask of pressed logical buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InputMask(u32);

impl InputMask {
    /// No buttons pressed
    pub const EMPTY: InputMask = InputMask(0);

    pub fn from_bits(bits: u32) -> Self {
        InputMask(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Mask with only `bit` set
    pub fn bit(bit: u8) -> Self {
        InputMask(1u32 << (bit & 31))
    }

    pub fn with(self, bit: u8) -> Self {
        self | InputMask::bit(bit)
    }

    pub fn contains(self, bit: u8) -> bool {
        self.0 & (1u32 << (bit & 31)) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for InputMask {
    type Output = InputMask;

    fn bitor(self, rhs: InputMask) -> InputMask {
        InputMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for InputMask {
    fn bitor_assign(&mut self, rhs: InputMask) {
        self.0 |= rhs.0;
    }
}

/// NES controller buttons in mask bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NesButton {
    A = 0,
    B = 1,
    Start = 2,
    Select = 3,
    Up = 4,
    Down = 5,
    Left = 6,
    Right = 7,
}

impl NesButton {
    /// Every button, in bit order
    pub const ALL: [NesButton; 8] = [
        NesButton::A,
        NesButton::B,
        NesButton::Start,
        NesButton::Select,
        NesButton::Up,
        NesButton::Down,
        NesButton::Left,
        NesButton::Right,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_bits() {
        let mask = InputMask::EMPTY.with(NesButton::A.bit()).with(NesButton::Right.bit());
        assert_eq!(mask.bits(), 0b1000_0001);
        assert!(mask.contains(0));
        assert!(mask.contains(7));
        assert!(!mask.contains(1));
    }

    #[test]
    fn test_mask_union() {
        let mut mask = InputMask::bit(2);
        mask |= InputMask::bit(15);
        assert_eq!(mask, InputMask::from_bits(0x8004));
        assert_eq!(InputMask::bit(1) | InputMask::bit(1), InputMask::bit(1));
    }

    #[test]
    fn test_nes_button_order() {
        for (i, button) in NesButton::ALL.iter().enumerate() {
            assert_eq!(button.bit() as usize, i);
        }
    }
}
