// Cartridge module - ROM image validation
//
// ROM images are untrusted input. Everything here is a pure function over
// the bytes; nothing reaches the core until validation has passed.

pub mod ines;

pub use ines::INesHeader;

use crate::console::Console;

/// Mapper numbers the NES core can run
pub const SUPPORTED_MAPPERS: [u16; 5] = [0, 1, 2, 3, 4];

/// Largest CHIP-8 program (0x200..0x1000)
pub const CHIP8_MAX_ROM_SIZE: usize = 3584;

/// Battery RAM size for mappers that carry one
pub const NES_SAVE_SIZE: usize = 8 * 1024;

/// ROM validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomError {
    /// Missing or wrong magic number
    InvalidHeader,
    /// Mapper outside the supported set
    UnsupportedMapper(u16),
    /// Header byte 9 uses the exponent-multiplier size form
    UnsupportedHeaderEncoding,
    /// File length does not match the header
    SizeMismatch { expected: usize, actual: usize },
    /// Program does not fit the console's address space
    TooLarge { max: usize, actual: usize },
}

impl RomError {
    /// User-visible reason string
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for RomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RomError::InvalidHeader => write!(f, "Invalid header"),
            RomError::UnsupportedMapper(n) => {
                write!(f, "Emulator cannot handle mapper number {}", n)
            }
            RomError::UnsupportedHeaderEncoding => write!(
                f,
                "Exponential rom header size, emulator cannot handle file"
            ),
            RomError::SizeMismatch { expected, actual } => write!(
                f,
                "Bad filesize (expected {} bytes, found {})",
                expected, actual
            ),
            RomError::TooLarge { max, actual } => {
                write!(f, "File too large ({} bytes, limit {})", actual, max)
            }
        }
    }
}

impl std::error::Error for RomError {}

/// What validation learned about an accepted ROM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomInfo {
    /// Console the image was validated for
    pub console: Console,
    /// Parsed header (NES only)
    pub header: Option<INesHeader>,
    /// Size of the battery save region, 0 when the cartridge has none
    pub save_size: usize,
}

impl RomInfo {
    pub fn mapper(&self) -> Option<u16> {
        self.header.map(|h| h.mapper)
    }

    pub fn has_save(&self) -> bool {
        self.save_size > 0
    }
}

/// Validate a raw ROM image for `console`
///
/// NES checks run in order: magic, mapper, size encoding, exact length.
/// CHIP-8 images only have a size limit.
///
/// # Arguments
///
/// * `console` - Console the image is meant for
/// * `bytes` - The raw file contents
///
/// # Returns
///
/// The decoded ROM information, or the first failed check
///
/// # Example
///
/// ```
/// use emu_host::cartridge::{validate_rom, RomError};
/// use emu_host::console::Console;
///
/// let err = validate_rom(Console::Nes, b"not a rom").unwrap_err();
/// assert_eq!(err, RomError::InvalidHeader);
/// ```
pub fn validate_rom(console: Console, bytes: &[u8]) -> Result<RomInfo, RomError> {
    match console {
        Console::Nes => validate_nes(bytes),
        Console::Chip8 => validate_chip8(bytes),
    }
}

fn validate_nes(bytes: &[u8]) -> Result<RomInfo, RomError> {
    let header = INesHeader::parse(bytes)?;

    if !SUPPORTED_MAPPERS.contains(&header.mapper) {
        return Err(RomError::UnsupportedMapper(header.mapper));
    }

    if header.exponential_size {
        return Err(RomError::UnsupportedHeaderEncoding);
    }

    let expected = header.expected_file_size();
    if bytes.len() != expected {
        return Err(RomError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    Ok(RomInfo {
        console: Console::Nes,
        header: Some(header),
        save_size: nes_save_size(header.mapper),
    })
}

fn validate_chip8(bytes: &[u8]) -> Result<RomInfo, RomError> {
    if bytes.len() > CHIP8_MAX_ROM_SIZE {
        return Err(RomError::TooLarge {
            max: CHIP8_MAX_ROM_SIZE,
            actual: bytes.len(),
        });
    }

    Ok(RomInfo {
        console: Console::Chip8,
        header: None,
        save_size: 0,
    })
}

/// Battery RAM size for an NES mapper
///
/// MMC1 (1) and MMC3 (4) boards get 8 KiB; the rest have no save.
pub fn nes_save_size(mapper: u16) -> usize {
    match mapper {
        1 | 4 => NES_SAVE_SIZE,
        _ => 0,
    }
}

/// Build the save image a session starts with
///
/// A stored save of the right length is reused. Anything else is replaced
/// with a zero-filled region of the cartridge's size.
pub fn initial_save(info: &RomInfo, stored: Option<Vec<u8>>) -> Option<Vec<u8>> {
    if !info.has_save() {
        return None;
    }
    match stored {
        Some(bytes) if bytes.len() == info.save_size => Some(bytes),
        _ => Some(vec![0u8; info.save_size]),
    }
}
