// Input configuration module
//
// Loads and saves key / controller bindings as TOML.
//
// ```toml
// [nes.a]
// key = "KeyZ"
// button = "South"
//
// [chip8]
// keys = ["KeyX", "Digit1", ...]
// ```

use super::{GamepadMapping, KeyboardMapping, NesButton};
use crate::console::Console;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use winit::keyboard::KeyCode;

/// One NES button: keyboard key and optional controller button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingConfig {
    /// Key name, e.g. "KeyZ"
    pub key: String,
    /// Controller button name, e.g. "South"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<String>,
}

impl BindingConfig {
    fn new(key: &str, button: &str) -> Self {
        Self {
            key: key.to_string(),
            button: Some(button.to_string()),
        }
    }
}

/// NES bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NesInputConfig {
    pub a: BindingConfig,
    pub b: BindingConfig,
    pub start: BindingConfig,
    pub select: BindingConfig,
    pub up: BindingConfig,
    pub down: BindingConfig,
    pub left: BindingConfig,
    pub right: BindingConfig,
}

impl NesInputConfig {
    pub fn default_mapping() -> Self {
        Self {
            a: BindingConfig::new("KeyZ", "South"),
            b: BindingConfig::new("KeyX", "East"),
            start: BindingConfig::new("KeyQ", "Start"),
            select: BindingConfig::new("Enter", "Select"),
            up: BindingConfig::new("ArrowUp", "DPadUp"),
            down: BindingConfig::new("ArrowDown", "DPadDown"),
            left: BindingConfig::new("ArrowLeft", "DPadLeft"),
            right: BindingConfig::new("ArrowRight", "DPadRight"),
        }
    }

    fn bindings(&self) -> [(NesButton, &BindingConfig); 8] {
        [
            (NesButton::A, &self.a),
            (NesButton::B, &self.b),
            (NesButton::Start, &self.start),
            (NesButton::Select, &self.select),
            (NesButton::Up, &self.up),
            (NesButton::Down, &self.down),
            (NesButton::Left, &self.left),
            (NesButton::Right, &self.right),
        ]
    }
}

/// CHIP-8 keypad, index = hex key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chip8InputConfig {
    pub keys: Vec<String>,
}

impl Chip8InputConfig {
    pub fn default_mapping() -> Self {
        let keys = [
            "KeyX", "Digit1", "Digit2", "Digit3", "KeyQ", "KeyW", "KeyE", "KeyA", "KeyS", "KeyD",
            "KeyZ", "KeyC", "Digit4", "KeyR", "KeyF", "KeyV",
        ];
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Complete input configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    pub nes: NesInputConfig,
    pub chip8: Chip8InputConfig,
}

impl InputConfig {
    /// Create a new input configuration with default mappings
    pub fn new() -> Self {
        Self {
            nes: NesInputConfig::default_mapping(),
            chip8: Chip8InputConfig::default_mapping(),
        }
    }

    /// Runtime keyboard table for `console`
    ///
    /// # Returns
    /// Result containing KeyboardMapping or error message
    pub fn keyboard_mapping(&self, console: Console) -> Result<KeyboardMapping, String> {
        match console {
            Console::Nes => {
                let mut bindings = Vec::with_capacity(8);
                for (button, binding) in self.nes.bindings() {
                    bindings.push((string_to_keycode(&binding.key)?, button.bit()));
                }
                Ok(KeyboardMapping::new(bindings))
            }
            Console::Chip8 => {
                if self.chip8.keys.len() != 16 {
                    return Err(format!(
                        "CHIP-8 keypad needs 16 keys, found {}",
                        self.chip8.keys.len()
                    ));
                }
                let mut bindings = Vec::with_capacity(16);
                for (bit, key) in self.chip8.keys.iter().enumerate() {
                    bindings.push((string_to_keycode(key)?, bit as u8));
                }
                Ok(KeyboardMapping::new(bindings))
            }
        }
    }

    /// Runtime controller table for `console`
    ///
    /// # Returns
    /// Result containing GamepadMapping or error message
    pub fn gamepad_mapping(&self, console: Console) -> Result<GamepadMapping, String> {
        match console {
            Console::Nes => {
                let mut bindings = Vec::with_capacity(8);
                for (button, binding) in self.nes.bindings() {
                    if let Some(name) = &binding.button {
                        bindings.push((string_to_gilrs_button(name)?, button.bit()));
                    }
                }
                Ok(GamepadMapping::new(bindings))
            }
            Console::Chip8 => Ok(GamepadMapping::chip8_default()),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// # Arguments
    /// * `path` - Path to the TOML configuration file
    ///
    /// # Returns
    /// Result containing InputConfig or error message
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: InputConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), String> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        fs::write(path, toml_string)
            .map_err(|e| format!("Failed to write config file: {}", e))?;

        Ok(())
    }

    /// Try to load configuration from file, or create default if it doesn't exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load_from_file(&path).unwrap_or_else(|e| {
            eprintln!("Could not load input config ({}), using defaults", e);
            let config = Self::new();
            if let Err(e) = config.save_to_file(&path) {
                eprintln!("Warning: Could not save default input config: {}", e);
            } else {
                println!("Created default input configuration file");
            }
            config
        })
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert string to KeyCode
fn string_to_keycode(s: &str) -> Result<KeyCode, String> {
    match s {
        "KeyA" => Ok(KeyCode::KeyA),
        "KeyB" => Ok(KeyCode::KeyB),
        "KeyC" => Ok(KeyCode::KeyC),
        "KeyD" => Ok(KeyCode::KeyD),
        "KeyE" => Ok(KeyCode::KeyE),
        "KeyF" => Ok(KeyCode::KeyF),
        "KeyG" => Ok(KeyCode::KeyG),
        "KeyH" => Ok(KeyCode::KeyH),
        "KeyI" => Ok(KeyCode::KeyI),
        "KeyJ" => Ok(KeyCode::KeyJ),
        "KeyK" => Ok(KeyCode::KeyK),
        "KeyL" => Ok(KeyCode::KeyL),
        "KeyM" => Ok(KeyCode::KeyM),
        "KeyN" => Ok(KeyCode::KeyN),
        "KeyO" => Ok(KeyCode::KeyO),
        "KeyP" => Ok(KeyCode::KeyP),
        "KeyQ" => Ok(KeyCode::KeyQ),
        "KeyR" => Ok(KeyCode::KeyR),
        "KeyS" => Ok(KeyCode::KeyS),
        "KeyT" => Ok(KeyCode::KeyT),
        "KeyU" => Ok(KeyCode::KeyU),
        "KeyV" => Ok(KeyCode::KeyV),
        "KeyW" => Ok(KeyCode::KeyW),
        "KeyX" => Ok(KeyCode::KeyX),
        "KeyY" => Ok(KeyCode::KeyY),
        "KeyZ" => Ok(KeyCode::KeyZ),
        "Digit0" => Ok(KeyCode::Digit0),
        "Digit1" => Ok(KeyCode::Digit1),
        "Digit2" => Ok(KeyCode::Digit2),
        "Digit3" => Ok(KeyCode::Digit3),
        "Digit4" => Ok(KeyCode::Digit4),
        "Digit5" => Ok(KeyCode::Digit5),
        "Digit6" => Ok(KeyCode::Digit6),
        "Digit7" => Ok(KeyCode::Digit7),
        "Digit8" => Ok(KeyCode::Digit8),
        "Digit9" => Ok(KeyCode::Digit9),
        "ArrowUp" => Ok(KeyCode::ArrowUp),
        "ArrowDown" => Ok(KeyCode::ArrowDown),
        "ArrowLeft" => Ok(KeyCode::ArrowLeft),
        "ArrowRight" => Ok(KeyCode::ArrowRight),
        "Enter" => Ok(KeyCode::Enter),
        "Space" => Ok(KeyCode::Space),
        "Backspace" => Ok(KeyCode::Backspace),
        "Tab" => Ok(KeyCode::Tab),
        "ShiftLeft" => Ok(KeyCode::ShiftLeft),
        "ShiftRight" => Ok(KeyCode::ShiftRight),
        "ControlLeft" => Ok(KeyCode::ControlLeft),
        "ControlRight" => Ok(KeyCode::ControlRight),
        "AltLeft" => Ok(KeyCode::AltLeft),
        "AltRight" => Ok(KeyCode::AltRight),
        _ => Err(format!("Unknown key code: {}", s)),
    }
}

/// Convert string to gilrs::Button
fn string_to_gilrs_button(s: &str) -> Result<gilrs::Button, String> {
    use gilrs::Button;

    match s {
        "South" => Ok(Button::South),
        "East" => Ok(Button::East),
        "North" => Ok(Button::North),
        "West" => Ok(Button::West),
        "LeftTrigger" => Ok(Button::LeftTrigger),
        "LeftTrigger2" => Ok(Button::LeftTrigger2),
        "RightTrigger" => Ok(Button::RightTrigger),
        "RightTrigger2" => Ok(Button::RightTrigger2),
        "Select" => Ok(Button::Select),
        "Start" => Ok(Button::Start),
        "Mode" => Ok(Button::Mode),
        "LeftThumb" => Ok(Button::LeftThumb),
        "RightThumb" => Ok(Button::RightThumb),
        "DPadUp" => Ok(Button::DPadUp),
        "DPadDown" => Ok(Button::DPadDown),
        "DPadLeft" => Ok(Button::DPadLeft),
        "DPadRight" => Ok(Button::DPadRight),
        _ => Err(format!("Unknown gamepad button: {}", s)),
    }
}
