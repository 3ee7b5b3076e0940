// Emulation host library
// Runs a sandboxed emulation core: ROM validation, pacing, audio
// scheduling, input, persistence and the session lifecycle around them.

// Public modules
pub mod audio;
pub mod bridge;
pub mod cartridge;
pub mod console;
pub mod core;
pub mod display;
pub mod emulator;
pub mod input;
pub mod logger;
pub mod pacer;
pub mod persistence;

// Re-export main types for convenience
#[cfg(feature = "audio")]
pub use audio::CpalAudioOutput;
pub use audio::{AudioChunk, AudioOutput, AudioScheduler, NullAudioOutput};
pub use bridge::{BufferBridge, LinearBuffer};
pub use cartridge::{validate_rom, RomError, RomInfo};
pub use console::Console;
pub use crate::core::{
    CoreError, CoreHandle, CoreLoader, CoreModule, StepEvents, WasmCore, WasmCoreLoader,
};
pub use display::{DisplaySurface, FrameBuffer, FrameView, WindowConfig};
pub use emulator::{EmulatorHost, HostBuilder, HostConfig, HostError, HostState};
pub use input::{ControllerRegistry, InputAggregator, InputConfig, InputMask};
pub use logger::{LogLevel, Logger};
pub use pacer::{ClockPacer, PacerSink, TickReport};
pub use persistence::{BackgroundStorage, FileStorage, PersistenceBridge, PersistenceConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_components() {
        // Test that the session-independent pieces can be instantiated
        let _pacer = ClockPacer::new(Console::Nes);
        let _input = InputAggregator::for_console(Console::Chip8);
        let _frame = FrameBuffer::new(64, 32);
        let _logger = Logger::new();
        let _scheduler = AudioScheduler::new(NullAudioOutput);
        let _persistence = PersistenceBridge::new(PersistenceConfig::new("game"), 0);
    }
}
