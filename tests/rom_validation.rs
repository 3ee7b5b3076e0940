// ROM validation properties

mod common;

use common::nes_rom;
use emu_host::cartridge::{validate_rom, RomError};
use emu_host::console::Console;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn valid_images_are_accepted(
        mapper in 0u16..=4,
        prg in 1u8..=4,
        chr in 0u8..=4,
        trainer in any::<bool>(),
    ) {
        let rom = nes_rom(mapper, prg, chr, trainer);
        let info = validate_rom(Console::Nes, &rom).unwrap();
        prop_assert_eq!(info.mapper(), Some(mapper));
        prop_assert_eq!(info.has_save(), mapper == 1 || mapper == 4);
    }

    #[test]
    fn one_byte_off_is_size_mismatch(
        mapper in 0u16..=4,
        prg in 1u8..=4,
        chr in 0u8..=4,
        trainer in any::<bool>(),
        longer in any::<bool>(),
    ) {
        let mut rom = nes_rom(mapper, prg, chr, trainer);
        let expected = rom.len();
        if longer {
            rom.push(0);
        } else {
            rom.pop();
        }
        prop_assert_eq!(
            validate_rom(Console::Nes, &rom),
            Err(RomError::SizeMismatch { expected, actual: rom.len() })
        );
    }

    #[test]
    fn mapper_five_is_unsupported(
        prg in 1u8..=4,
        chr in 0u8..=4,
        trainer in any::<bool>(),
        extra in 0usize..64,
    ) {
        let mut rom = nes_rom(5, prg, chr, trainer);
        rom.extend(std::iter::repeat(0).take(extra));
        prop_assert_eq!(
            validate_rom(Console::Nes, &rom),
            Err(RomError::UnsupportedMapper(5))
        );
    }

    #[test]
    fn chip8_limit(len in 0usize..8192) {
        let result = validate_rom(Console::Chip8, &vec![0u8; len]);
        if len <= 3584 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(result, Err(RomError::TooLarge { max: 3584, actual: len }));
        }
    }
}

#[test]
fn test_exponential_size_rejected_before_size() {
    let mut rom = nes_rom(0, 1, 1, false);
    rom[9] = 0x0F;
    assert_eq!(
        validate_rom(Console::Nes, &rom),
        Err(RomError::UnsupportedHeaderEncoding)
    );
    rom[9] = 0xF0;
    assert_eq!(
        validate_rom(Console::Nes, &rom),
        Err(RomError::UnsupportedHeaderEncoding)
    );
}

#[test]
fn test_bad_magic() {
    let mut rom = nes_rom(0, 1, 1, false);
    rom[3] = 0x1B;
    assert_eq!(validate_rom(Console::Nes, &rom), Err(RomError::InvalidHeader));
}
