// Gamepad input module
//
// - ControllerRegistry: which controllers are connected and which one drives input
// - GamepadMapping: controller button to mask bit table
// - GamepadHub: gilrs event pump feeding connect/disconnect events

use super::{InputMask, NesButton};
use crate::console::Console;
use gilrs::{Button as GilrsButton, Event, EventType, Gamepad, Gilrs};
use std::collections::{BTreeSet, HashSet};

/// Controller identifier as reported by gilrs
pub type ControllerId = usize;

/// Connected controllers and the current primary
///
/// The first controller to connect becomes primary. When the primary
/// disconnects, the lowest remaining id takes over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerRegistry {
    connected: BTreeSet<ControllerId>,
    primary: Option<ControllerId>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connected controller
    ///
    /// # Returns
    /// `true` if the controller became primary
    pub fn connect(&mut self, id: ControllerId) -> bool {
        self.connected.insert(id);
        if self.primary.is_none() {
            self.primary = Some(id);
            return true;
        }
        false
    }

    /// Forget a disconnected controller
    ///
    /// # Returns
    /// The new primary if it changed
    pub fn disconnect(&mut self, id: ControllerId) -> Option<ControllerId> {
        self.connected.remove(&id);
        if self.primary == Some(id) {
            self.primary = self.connected.iter().next().copied();
            return self.primary;
        }
        None
    }

    /// Controller currently driving input
    pub fn primary(&self) -> Option<ControllerId> {
        self.primary
    }

    pub fn is_connected(&self, id: ControllerId) -> bool {
        self.connected.contains(&id)
    }

    pub fn connected_count(&self) -> usize {
        self.connected.len()
    }
}

/// Polled controller button state
pub trait ButtonSource {
    fn is_pressed(&self, button: GilrsButton) -> bool;
}

impl ButtonSource for Gamepad<'_> {
    fn is_pressed(&self, button: GilrsButton) -> bool {
        Gamepad::is_pressed(self, button)
    }
}

impl ButtonSource for HashSet<GilrsButton> {
    fn is_pressed(&self, button: GilrsButton) -> bool {
        self.contains(&button)
    }
}

/// Controller button to mask bit table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamepadMapping {
    bindings: Vec<(GilrsButton, u8)>,
}

impl GamepadMapping {
    pub fn new(bindings: Vec<(GilrsButton, u8)>) -> Self {
        Self { bindings }
    }

    /// Default NES layout (standard gamepad)
    ///
    /// # Default Mappings
    /// - South (A/Cross): A button
    /// - East (B/Circle): B button
    /// - Start: Start
    /// - Select/Back: Select
    /// - D-pad: D-pad
    pub fn nes_default() -> Self {
        Self::new(vec![
            (GilrsButton::South, NesButton::A.bit()),
            (GilrsButton::East, NesButton::B.bit()),
            (GilrsButton::Start, NesButton::Start.bit()),
            (GilrsButton::Select, NesButton::Select.bit()),
            (GilrsButton::DPadUp, NesButton::Up.bit()),
            (GilrsButton::DPadDown, NesButton::Down.bit()),
            (GilrsButton::DPadLeft, NesButton::Left.bit()),
            (GilrsButton::DPadRight, NesButton::Right.bit()),
        ])
    }

    /// CHIP-8 has no controller layout; the keypad is keyboard-only
    pub fn chip8_default() -> Self {
        Self::new(Vec::new())
    }

    pub fn for_console(console: Console) -> Self {
        match console {
            Console::Nes => Self::nes_default(),
            Console::Chip8 => Self::chip8_default(),
        }
    }

    /// Build a mask from the buttons `source` reports as held
    pub fn poll(&self, source: &dyn ButtonSource) -> InputMask {
        self.bindings
            .iter()
            .filter(|(button, _)| source.is_pressed(*button))
            .fold(InputMask::EMPTY, |mask, &(_, bit)| mask.with(bit))
    }

    pub fn bindings(&self) -> &[(GilrsButton, u8)] {
        &self.bindings
    }
}

/// Connection change reported by the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamepadEvent {
    Connected(ControllerId),
    Disconnected(ControllerId),
}

/// gilrs event pump
///
/// Gamepad support is optional: when gilrs cannot start, the hub reports
/// no controllers and input falls back to the keyboard.
pub struct GamepadHub {
    gilrs: Option<Gilrs>,
    started: bool,
}

impl GamepadHub {
    pub fn new() -> Self {
        let gilrs = match Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(e) => {
                eprintln!("Failed to initialize gamepad support: {}", e);
                None
            }
        };
        Self {
            gilrs,
            started: false,
        }
    }

    /// A hub with gamepad support disabled
    pub fn disabled() -> Self {
        Self {
            gilrs: None,
            started: false,
        }
    }

    /// Drain pending gilrs events
    ///
    /// The first call also reports controllers that were already
    /// connected when the hub was created.
    pub fn pump(&mut self) -> Vec<GamepadEvent> {
        let mut events = Vec::new();
        let Some(gilrs) = self.gilrs.as_mut() else {
            return events;
        };

        if !self.started {
            self.started = true;
            for (id, gamepad) in gilrs.gamepads() {
                if gamepad.is_connected() {
                    println!("Gamepad '{}' (ID: {}) detected", gamepad.name(), id);
                    events.push(GamepadEvent::Connected(id.into()));
                }
            }
        }

        while let Some(Event { id, event, .. }) = gilrs.next_event() {
            match event {
                EventType::Connected => events.push(GamepadEvent::Connected(id.into())),
                EventType::Disconnected => events.push(GamepadEvent::Disconnected(id.into())),
                _ => {}
            }
        }

        events
    }

    /// Look up a connected controller by id
    pub fn gamepad(&self, id: ControllerId) -> Option<Gamepad<'_>> {
        self.gilrs
            .as_ref()?
            .gamepads()
            .find(|(gid, _)| usize::from(*gid) == id)
            .map(|(_, gamepad)| gamepad)
    }
}

impl Default for GamepadHub {
    fn default() -> Self {
        Self::new()
    }
}
