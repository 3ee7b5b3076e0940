// Unified input module
//
// Merges keyboard and controller state into the per-step input mask.

use super::{
    gamepad::ControllerId, ButtonSource, ControllerRegistry, GamepadEvent, GamepadMapping,
    InputMask, KeyboardHandler, KeyboardMapping,
};
use crate::console::Console;
use winit::keyboard::KeyCode;

/// Keyboard and controller input merged into one mask
///
/// `current_mask()` is `keyboard | controller`. The controller part is
/// whatever the last `poll_controller` call produced.
pub struct InputAggregator {
    keyboard: KeyboardHandler,
    gamepad_mapping: GamepadMapping,
    registry: ControllerRegistry,
    controller_mask: InputMask,
}

impl InputAggregator {
    /// Create an aggregator
    ///
    /// # Arguments
    /// * `keyboard_mapping` - Key code to bit table
    /// * `gamepad_mapping` - Controller button to bit table
    /// * `registry` - Controller registry to resolve the primary controller from
    pub fn new(
        keyboard_mapping: KeyboardMapping,
        gamepad_mapping: GamepadMapping,
        registry: ControllerRegistry,
    ) -> Self {
        Self {
            keyboard: KeyboardHandler::new(keyboard_mapping),
            gamepad_mapping,
            registry,
            controller_mask: InputMask::EMPTY,
        }
    }

    /// Aggregator with the console's default bindings
    pub fn for_console(console: Console) -> Self {
        Self::new(
            KeyboardMapping::for_console(console),
            GamepadMapping::for_console(console),
            ControllerRegistry::new(),
        )
    }

    /// Key pressed; unmapped codes are ignored
    pub fn on_key_down(&mut self, key: KeyCode) -> bool {
        self.keyboard.key_down(key)
    }

    /// Key released; unmapped codes are ignored
    pub fn on_key_up(&mut self, key: KeyCode) -> bool {
        self.keyboard.key_up(key)
    }

    /// Sample the primary controller
    ///
    /// # Arguments
    /// * `source` - Button state of the primary controller, `None` if there is none
    ///
    /// # Returns
    /// The controller part of the mask
    pub fn poll_controller(&mut self, source: Option<&dyn ButtonSource>) -> InputMask {
        self.controller_mask = match source {
            Some(source) => self.gamepad_mapping.poll(source),
            None => InputMask::EMPTY,
        };
        self.controller_mask
    }

    /// Mask to hand to the core for this step
    pub fn current_mask(&self) -> InputMask {
        self.keyboard.mask() | self.controller_mask
    }

    /// Apply a connection change from the gamepad hub
    ///
    /// Returns true when the primary controller changed.
    pub fn apply_gamepad_event(&mut self, event: GamepadEvent) -> bool {
        match event {
            GamepadEvent::Connected(id) => self.registry.connect(id),
            GamepadEvent::Disconnected(id) => {
                let was_primary = self.registry.primary() == Some(id);
                self.registry.disconnect(id);
                if was_primary {
                    self.controller_mask = InputMask::EMPTY;
                }
                was_primary
            }
        }
    }

    /// Controller currently driving input
    pub fn primary_controller(&self) -> Option<ControllerId> {
        self.registry.primary()
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    /// Drop all held state (focus loss, session restart)
    pub fn reset(&mut self) {
        self.keyboard.release_all();
        self.controller_mask = InputMask::EMPTY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gilrs::Button as GilrsButton;
    use std::collections::HashSet;

    fn held(buttons: &[GilrsButton]) -> HashSet<GilrsButton> {
        buttons.iter().copied().collect()
    }

    #[test]
    fn test_keyboard_and_controller_merge() {
        let mut input = InputAggregator::for_console(Console::Nes);
        input.on_key_down(KeyCode::KeyZ);
        let pad = held(&[GilrsButton::DPadDown]);
        assert_eq!(input.poll_controller(Some(&pad)).bits(), 0b0010_0000);
        assert_eq!(input.current_mask().bits(), 0b0010_0001);
    }

    #[test]
    fn test_overlapping_sources() {
        let mut input = InputAggregator::for_console(Console::Nes);
        input.on_key_down(KeyCode::KeyZ);
        let pad = held(&[GilrsButton::South]);
        input.poll_controller(Some(&pad));
        assert_eq!(input.current_mask().bits(), 1);

        input.on_key_up(KeyCode::KeyZ);
        assert_eq!(input.current_mask().bits(), 1);
        input.poll_controller(Some(&held(&[])));
        assert!(input.current_mask().is_empty());
    }

    #[test]
    fn test_no_controller_clears_controller_mask() {
        let mut input = InputAggregator::for_console(Console::Nes);
        input.poll_controller(Some(&held(&[GilrsButton::Start])));
        assert!(!input.current_mask().is_empty());
        input.poll_controller(None);
        assert!(input.current_mask().is_empty());
    }

    #[test]
    fn test_gamepad_events_update_registry() {
        let mut input = InputAggregator::for_console(Console::Nes);
        assert!(input.apply_gamepad_event(GamepadEvent::Connected(7)));
        assert!(!input.apply_gamepad_event(GamepadEvent::Connected(2)));
        assert_eq!(input.primary_controller(), Some(7));

        input.poll_controller(Some(&held(&[GilrsButton::East])));
        assert!(input.apply_gamepad_event(GamepadEvent::Disconnected(7)));
        assert_eq!(input.primary_controller(), Some(2));
        assert!(!input.apply_gamepad_event(GamepadEvent::Disconnected(9)));
        assert!(input.current_mask().is_empty());
    }

    #[test]
    fn test_chip8_keys() {
        let mut input = InputAggregator::for_console(Console::Chip8);
        input.on_key_down(KeyCode::KeyV);
        input.on_key_down(KeyCode::Digit2);
        assert_eq!(input.current_mask().bits(), 0x8004);
        input.reset();
        assert!(input.current_mask().is_empty());
    }
}
