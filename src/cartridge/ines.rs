// iNES header parsing
//
// Header layout (16 bytes):
// - 0..4: "NES\x1A"
// - 4:    PRG ROM size, low byte (16 KiB units)
// - 5:    CHR ROM size, low byte (8 KiB units)
// - 6:    flags 6 (bit 1 battery, bit 2 trainer, high nibble mapper bits 0-3)
// - 7:    flags 7 (high nibble mapper bits 4-7)
// - 8:    low nibble mapper bits 8-11
// - 9:    PRG/CHR size high nibbles (0xF = exponential encoding)

use super::RomError;

/// iNES magic number
pub const INES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Header length in bytes
pub const HEADER_SIZE: usize = 16;

/// Trainer length in bytes
pub const TRAINER_SIZE: usize = 512;

/// PRG ROM bank size
pub const PRG_BANK_SIZE: usize = 16 * 1024;

/// CHR ROM bank size
pub const CHR_BANK_SIZE: usize = 8 * 1024;

/// Decoded iNES header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct INesHeader {
    /// Mapper number (12 bits)
    pub mapper: u16,
    /// Number of 16 KiB PRG ROM banks
    pub prg_banks: u16,
    /// Number of 8 KiB CHR ROM banks
    pub chr_banks: u16,
    /// A 512-byte trainer precedes PRG ROM
    pub has_trainer: bool,
    /// Cartridge declares battery-backed RAM
    pub has_battery: bool,
    /// Byte 9 uses the exponent-multiplier size form
    pub exponential_size: bool,
}

impl INesHeader {
    /// Decode the header at the start of `bytes`
    ///
    /// Only the magic number is checked here; mapper and size checks
    /// belong to [`super::validate_rom`].
    ///
    /// # Errors
    ///
    /// Returns `RomError::InvalidHeader` if the buffer is shorter than a header
    /// or the magic does not match
    pub fn parse(bytes: &[u8]) -> Result<Self, RomError> {
        if bytes.len() < HEADER_SIZE || bytes[0..4] != INES_MAGIC {
            return Err(RomError::InvalidHeader);
        }

        let mapper = u16::from(bytes[6] >> 4)
            | u16::from(bytes[7] & 0xF0)
            | (u16::from(bytes[8] & 0x0F) << 8);
        let prg_banks = u16::from(bytes[4]) | (u16::from(bytes[9] & 0x0F) << 8);
        let chr_banks = u16::from(bytes[5]) | (u16::from(bytes[9] & 0xF0) << 4);

        Ok(INesHeader {
            mapper,
            prg_banks,
            chr_banks,
            has_trainer: bytes[6] & 0x04 != 0,
            has_battery: bytes[6] & 0x02 != 0,
            exponential_size: bytes[9] & 0x0F == 0x0F || bytes[9] & 0xF0 == 0xF0,
        })
    }

    /// Total file size implied by the header
    pub fn expected_file_size(&self) -> usize {
        let trainer = if self.has_trainer { TRAINER_SIZE } else { 0 };
        HEADER_SIZE
            + trainer
            + usize::from(self.prg_banks) * PRG_BANK_SIZE
            + usize::from(self.chr_banks) * CHR_BANK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(bytes: [u8; 6]) -> [u8; HEADER_SIZE] {
        let mut h = [0u8; HEADER_SIZE];
        h[0..4].copy_from_slice(&INES_MAGIC);
        h[4..10].copy_from_slice(&bytes);
        h
    }

    #[test]
    fn test_parse_basic_header() {
        let h = header([2, 1, 0x00, 0x00, 0x00, 0x00]);
        let parsed = INesHeader::parse(&h).unwrap();

        assert_eq!(parsed.mapper, 0);
        assert_eq!(parsed.prg_banks, 2);
        assert_eq!(parsed.chr_banks, 1);
        assert!(!parsed.has_trainer);
        assert_eq!(parsed.expected_file_size(), 16 + 32768 + 8192);
    }

    #[test]
    fn test_mapper_nibbles() {
        // mapper 0x2A4: byte6 high = 4, byte7 high = 0xA0, byte8 low = 2
        let h = header([1, 0, 0x40, 0xA0, 0x02, 0x00]);
        assert_eq!(INesHeader::parse(&h).unwrap().mapper, 0x2A4);
    }

    #[test]
    fn test_mapper_ignores_low_flag_nibbles() {
        // trainer and battery bits sit in the low nibble of byte 6
        let h = header([1, 0, 0x16, 0x0F, 0xF0, 0x00]);
        let parsed = INesHeader::parse(&h).unwrap();
        assert_eq!(parsed.mapper, 1);
        assert!(parsed.has_trainer);
        assert!(parsed.has_battery);
    }

    #[test]
    fn test_trainer_adds_512_bytes() {
        let h = header([1, 0, 0x04, 0x00, 0x00, 0x00]);
        assert_eq!(INesHeader::parse(&h).unwrap().expected_file_size(), 16 + 512 + 16384);
    }

    #[test]
    fn test_bank_high_nibbles() {
        let h = header([0x01, 0x02, 0x00, 0x00, 0x00, 0x21]);
        let parsed = INesHeader::parse(&h).unwrap();
        assert_eq!(parsed.prg_banks, 0x101);
        assert_eq!(parsed.chr_banks, 0x202);
        assert!(!parsed.exponential_size);
    }

    #[test]
    fn test_exponential_flag() {
        let low = header([1, 1, 0, 0, 0, 0x0F]);
        let high = header([1, 1, 0, 0, 0, 0xF0]);
        assert!(INesHeader::parse(&low).unwrap().exponential_size);
        assert!(INesHeader::parse(&high).unwrap().exponential_size);
    }

    #[test]
    fn test_bad_magic_and_short_buffer() {
        assert_eq!(INesHeader::parse(b"NES"), Err(RomError::InvalidHeader));
        let mut h = header([1, 1, 0, 0, 0, 0]);
        h[3] = 0x1B;
        assert_eq!(INesHeader::parse(&h), Err(RomError::InvalidHeader));
    }
}
