// Keyboard input mapping module
//
// Maps physical key codes to mask bits for the active console.
// Several keys may share one bit.

use super::{InputMask, NesButton};
use crate::console::Console;
use std::collections::HashSet;
use winit::keyboard::{KeyCode, PhysicalKey};

/// CHIP-8 keypad layout, index = hex key
const CHIP8_DEFAULT_KEYS: [KeyCode; 16] = [
    KeyCode::KeyX,   // 0
    KeyCode::Digit1, // 1
    KeyCode::Digit2, // 2
    KeyCode::Digit3, // 3
    KeyCode::KeyQ,   // 4
    KeyCode::KeyW,   // 5
    KeyCode::KeyE,   // 6
    KeyCode::KeyA,   // 7
    KeyCode::KeyS,   // 8
    KeyCode::KeyD,   // 9
    KeyCode::KeyZ,   // A
    KeyCode::KeyC,   // B
    KeyCode::Digit4, // C
    KeyCode::KeyR,   // D
    KeyCode::KeyF,   // E
    KeyCode::KeyV,   // F
];

/// Key code to mask bit table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardMapping {
    bindings: Vec<(KeyCode, u8)>,
}

impl KeyboardMapping {
    /// Create a mapping from explicit (key, bit) pairs
    pub fn new(bindings: Vec<(KeyCode, u8)>) -> Self {
        Self { bindings }
    }

    /// Default NES layout
    ///
    /// # Default Mappings
    /// - Arrow keys: D-pad
    /// - Z: A button
    /// - X: B button
    /// - Q: Start
    /// - Enter: Select
    pub fn nes_default() -> Self {
        Self::new(vec![
            (KeyCode::KeyZ, NesButton::A.bit()),
            (KeyCode::KeyX, NesButton::B.bit()),
            (KeyCode::KeyQ, NesButton::Start.bit()),
            (KeyCode::Enter, NesButton::Select.bit()),
            (KeyCode::ArrowUp, NesButton::Up.bit()),
            (KeyCode::ArrowDown, NesButton::Down.bit()),
            (KeyCode::ArrowLeft, NesButton::Left.bit()),
            (KeyCode::ArrowRight, NesButton::Right.bit()),
        ])
    }

    /// Default CHIP-8 layout (the 4x4 block under 1-4)
    pub fn chip8_default() -> Self {
        Self::new(
            CHIP8_DEFAULT_KEYS
                .iter()
                .enumerate()
                .map(|(bit, &key)| (key, bit as u8))
                .collect(),
        )
    }

    pub fn for_console(console: Console) -> Self {
        match console {
            Console::Nes => Self::nes_default(),
            Console::Chip8 => Self::chip8_default(),
        }
    }

    /// Mask bits bound to `key`
    ///
    /// # Returns
    /// An empty mask if the key is unmapped
    pub fn mask_for(&self, key: KeyCode) -> InputMask {
        self.bindings
            .iter()
            .filter(|(k, _)| *k == key)
            .fold(InputMask::EMPTY, |mask, &(_, bit)| mask.with(bit))
    }

    pub fn is_mapped(&self, key: KeyCode) -> bool {
        self.bindings.iter().any(|(k, _)| *k == key)
    }

    pub fn bindings(&self) -> &[(KeyCode, u8)] {
        &self.bindings
    }
}

/// Keyboard input handler
///
/// Tracks held mapped keys. The mask is recomputed from the held set, so
/// a released key can never leave its bit behind.
#[derive(Debug, Clone)]
pub struct KeyboardHandler {
    mapping: KeyboardMapping,
    pressed_keys: HashSet<KeyCode>,
}

impl KeyboardHandler {
    /// Create a keyboard handler
    ///
    /// # Example
    /// ```
    /// use emu_host::input::keyboard::{KeyboardHandler, KeyboardMapping};
    /// use winit::keyboard::KeyCode;
    ///
    /// let mut handler = KeyboardHandler::new(KeyboardMapping::nes_default());
    /// handler.key_down(KeyCode::KeyZ);
    /// assert_eq!(handler.mask().bits(), 1);
    /// ```
    pub fn new(mapping: KeyboardMapping) -> Self {
        Self {
            mapping,
            pressed_keys: HashSet::new(),
        }
    }

    /// Record a key press
    ///
    /// # Returns
    /// `true` if the key is mapped
    pub fn key_down(&mut self, key: KeyCode) -> bool {
        if !self.mapping.is_mapped(key) {
            return false;
        }
        self.pressed_keys.insert(key);
        true
    }

    /// Record a key release
    ///
    /// # Returns
    /// `true` if the key is mapped
    pub fn key_up(&mut self, key: KeyCode) -> bool {
        if !self.mapping.is_mapped(key) {
            return false;
        }
        self.pressed_keys.remove(&key);
        true
    }

    /// Handle a winit key press
    pub fn handle_key_press(&mut self, physical_key: PhysicalKey) -> bool {
        match physical_key {
            PhysicalKey::Code(key) => self.key_down(key),
            PhysicalKey::Unidentified(_) => false,
        }
    }

    /// Handle a winit key release
    pub fn handle_key_release(&mut self, physical_key: PhysicalKey) -> bool {
        match physical_key {
            PhysicalKey::Code(key) => self.key_up(key),
            PhysicalKey::Unidentified(_) => false,
        }
    }

    /// Mask of every held key
    pub fn mask(&self) -> InputMask {
        self.pressed_keys
            .iter()
            .fold(InputMask::EMPTY, |mask, &key| mask | self.mapping.mask_for(key))
    }

    /// Release every key (e.g. when the window loses focus)
    pub fn release_all(&mut self) {
        self.pressed_keys.clear();
    }

    pub fn mapping(&self) -> &KeyboardMapping {
        &self.mapping
    }
}
