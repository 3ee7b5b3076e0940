// Input aggregation properties

use emu_host::console::Console;
use emu_host::input::{InputAggregator, InputMask, KeyboardMapping};
use proptest::prelude::*;
use std::collections::HashSet;
use winit::keyboard::KeyCode;

/// Keys used by the generated sequences; the last two are unmapped on NES
const KEYS: [KeyCode; 10] = [
    KeyCode::KeyZ,
    KeyCode::KeyX,
    KeyCode::KeyQ,
    KeyCode::Enter,
    KeyCode::ArrowUp,
    KeyCode::ArrowDown,
    KeyCode::ArrowLeft,
    KeyCode::ArrowRight,
    KeyCode::KeyP,
    KeyCode::Space,
];

fn events() -> impl Strategy<Value = Vec<(usize, bool)>> {
    prop::collection::vec((0..KEYS.len(), any::<bool>()), 0..64)
}

proptest! {
    #[test]
    fn released_keys_never_hold_bits(sequence in events()) {
        let mapping = KeyboardMapping::nes_default();
        let mut input = InputAggregator::for_console(Console::Nes);
        // most recent event per key, `None` before the first
        let mut last_down: [Option<bool>; KEYS.len()] = [None; KEYS.len()];

        for (index, down) in sequence {
            let key = KEYS[index];
            if down {
                input.on_key_down(key);
            } else {
                input.on_key_up(key);
            }
            last_down[index] = Some(down);

            // a bit may only be set if some key bound to it is held
            let held = KEYS
                .iter()
                .zip(last_down.iter())
                .filter(|(_, last)| **last == Some(true))
                .fold(InputMask::EMPTY, |mask, (key, _)| mask | mapping.mask_for(*key));
            prop_assert_eq!(input.current_mask().bits() & !held.bits(), 0);
        }
    }

    #[test]
    fn repeated_releases_are_idempotent(index in 0usize..8, extra_ups in 1usize..8) {
        let mut input = InputAggregator::for_console(Console::Nes);
        let key = KEYS[index];
        for _ in 0..extra_ups {
            input.on_key_up(key);
        }
        prop_assert!(input.current_mask().is_empty());

        // a single press after any number of releases still registers
        input.on_key_down(key);
        prop_assert_eq!(input.current_mask().bits(), 1u32 << index);
        input.on_key_up(key);
        prop_assert!(input.current_mask().is_empty());
    }

    #[test]
    fn mask_matches_held_keys(sequence in events()) {
        let mapping = KeyboardMapping::nes_default();
        let mut input = InputAggregator::for_console(Console::Nes);
        let mut held = HashSet::new();

        for (index, down) in sequence {
            let key = KEYS[index];
            if down {
                input.on_key_down(key);
                held.insert(key);
            } else {
                input.on_key_up(key);
                held.remove(&key);
            }
        }

        let expected = held
            .iter()
            .fold(InputMask::EMPTY, |mask, key| mask | mapping.mask_for(*key));
        prop_assert_eq!(input.current_mask(), expected);
    }
}

#[test]
fn test_unmapped_keys_are_ignored() {
    let mut input = InputAggregator::for_console(Console::Nes);
    assert!(!input.on_key_down(KeyCode::KeyP));
    assert!(input.current_mask().is_empty());
}
