// Console - Per-console fixed configuration
//
// The host is console-agnostic apart from this table: clock rate,
// native resolution, audio rate and button count.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// NES PPU clock in Hz, the unit the NES core counts cycles in
pub const NES_CLOCK_HZ: u64 = 5_369_318;

/// CHIP-8 step rate in Hz (one tick per 2 ms)
pub const CHIP8_CLOCK_HZ: u64 = 500;

/// Audio rate shared by every core
pub const CORE_SAMPLE_RATE: u32 = 44_100;

/// Emulated console family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Console {
    /// Nintendo Entertainment System (iNES images)
    Nes,
    /// CHIP-8 interpreter (raw program images)
    Chip8,
}

impl Console {
    /// Clock rate of the core's cycle counter in Hz
    pub fn clock_hz(self) -> u64 {
        match self {
            Console::Nes => NES_CLOCK_HZ,
            Console::Chip8 => CHIP8_CLOCK_HZ,
        }
    }

    /// Native framebuffer size as (width, height)
    pub fn screen_size(self) -> (u32, u32) {
        match self {
            Console::Nes => (256, 240),
            Console::Chip8 => (64, 32),
        }
    }

    /// Sample rate of the PCM the core produces
    pub fn sample_rate(self) -> u32 {
        CORE_SAMPLE_RATE
    }

    /// Number of logical buttons in the input mask
    pub fn button_count(self) -> u32 {
        match self {
            Console::Nes => 8,
            Console::Chip8 => 16,
        }
    }

    /// Guess the console from a ROM file extension
    ///
    /// # Returns
    ///
    /// `None` when the extension is not recognized
    pub fn from_path(path: &Path) -> Option<Console> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "nes" => Some(Console::Nes),
            "ch8" | "c8" | "chip8" => Some(Console::Chip8),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Console::Nes => "nes",
            Console::Chip8 => "chip8",
        }
    }
}

impl std::fmt::Display for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Console {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nes" => Ok(Console::Nes),
            "chip8" | "chip-8" | "ch8" => Ok(Console::Chip8),
            other => Err(format!("Unknown console: {}", other)),
        }
    }
}
