// Core module - Boundary to the sandboxed emulation core
//
// The core is a black box with a narrow export table over one flat
// linear memory. Everything the host does to it goes through `CoreModule`.

pub mod loader;
pub mod wasm;

pub use loader::{CoreLoader, WasmCoreLoader};
pub use wasm::{ExportNames, WasmCore};

/// Offset into the core's linear memory
pub type Ptr = u32;

/// Opaque session identifier returned by `initialize_session`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoreHandle(pub u32);

/// Events reported by one `step` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepEvents(u32);

impl StepEvents {
    /// A video frame is ready
    pub const NEW_FRAME: StepEvents = StepEvents(1);
    /// The audio buffer is full and must be flushed
    pub const AUDIO_BUFFER_FULL: StepEvents = StepEvents(2);
    /// The cycle target was reached
    pub const TICKS_REACHED: StepEvents = StepEvents(4);

    pub const fn empty() -> Self {
        StepEvents(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        StepEvents(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: StepEvents) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: StepEvents) -> Self {
        StepEvents(self.0 | other.0)
    }
}

impl std::ops::BitOr for StepEvents {
    type Output = StepEvents;

    fn bitor(self, rhs: StepEvents) -> StepEvents {
        self.union(rhs)
    }
}

/// Core boundary failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The module could not be read, compiled or instantiated
    Load(String),
    /// A required export is absent or has the wrong signature
    MissingExport(String),
    /// An export call trapped
    Trap { export: &'static str, message: String },
    /// The core refused an allocation
    AllocationFailed { size: usize },
    /// The core refused to create a session
    SessionRejected,
    /// A host access fell outside linear memory
    OutOfBounds { ptr: Ptr, len: usize },
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::Load(msg) => write!(f, "Failed to load core module: {}", msg),
            CoreError::MissingExport(name) => write!(f, "Core module is missing export '{}'", name),
            CoreError::Trap { export, message } => {
                write!(f, "Core trapped in '{}': {}", export, message)
            }
            CoreError::AllocationFailed { size } => {
                write!(f, "Core refused to allocate {} bytes", size)
            }
            CoreError::SessionRejected => write!(f, "Core refused to create a session"),
            CoreError::OutOfBounds { ptr, len } => write!(
                f,
                "Linear memory access out of bounds (ptr 0x{:08X}, len {})",
                ptr, len
            ),
        }
    }
}

impl std::error::Error for CoreError {}

/// The core's export table
///
/// Preconditions follow the core's own contract: a pointer passed to
/// `free` came from `allocate` and is freed once; a handle passed to any
/// session call came from `initialize_session` and has not been released.
pub trait CoreModule: Send {
    /// Reserve `size` bytes of linear memory
    fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError>;

    /// Release a region returned by `allocate`
    fn free(&mut self, ptr: Ptr) -> Result<(), CoreError>;

    /// Create an emulation session from a ROM region and optional save region
    fn initialize_session(
        &mut self,
        rom: (Ptr, usize),
        save: Option<(Ptr, usize)>,
    ) -> Result<CoreHandle, CoreError>;

    /// Destroy a session
    fn release_session(&mut self, handle: CoreHandle) -> Result<(), CoreError>;

    /// Run until `target` cycles or until an event needs the host
    fn step(&mut self, handle: CoreHandle, target: u64) -> Result<StepEvents, CoreError>;

    /// Cycles elapsed since the session started
    fn current_cycle_count(&mut self, handle: CoreHandle) -> Result<u64, CoreError>;

    /// Location of the RGBA framebuffer
    fn frame_buffer_pointer(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError>;

    /// Set the held-button mask for following steps
    fn set_input_mask(&mut self, handle: CoreHandle, mask: u32) -> Result<(), CoreError>;

    /// Refresh and locate the battery save region
    fn export_save(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError>;

    /// Flush pending audio; returns the number of f32 samples now in the audio buffer
    fn flush_audio(&mut self, handle: CoreHandle) -> Result<usize, CoreError>;

    /// Location of the f32 audio buffer
    fn audio_buffer_pointer(&mut self) -> Result<Ptr, CoreError>;

    /// The whole linear memory
    fn memory(&self) -> &[u8];

    /// The whole linear memory, writable
    fn memory_mut(&mut self) -> &mut [u8];
}

impl<T: CoreModule + ?Sized> CoreModule for Box<T> {
    fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError> {
        (**self).allocate(size)
    }

    fn free(&mut self, ptr: Ptr) -> Result<(), CoreError> {
        (**self).free(ptr)
    }

    fn initialize_session(
        &mut self,
        rom: (Ptr, usize),
        save: Option<(Ptr, usize)>,
    ) -> Result<CoreHandle, CoreError> {
        (**self).initialize_session(rom, save)
    }

    fn release_session(&mut self, handle: CoreHandle) -> Result<(), CoreError> {
        (**self).release_session(handle)
    }

    fn step(&mut self, handle: CoreHandle, target: u64) -> Result<StepEvents, CoreError> {
        (**self).step(handle, target)
    }

    fn current_cycle_count(&mut self, handle: CoreHandle) -> Result<u64, CoreError> {
        (**self).current_cycle_count(handle)
    }

    fn frame_buffer_pointer(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError> {
        (**self).frame_buffer_pointer(handle)
    }

    fn set_input_mask(&mut self, handle: CoreHandle, mask: u32) -> Result<(), CoreError> {
        (**self).set_input_mask(handle, mask)
    }

    fn export_save(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError> {
        (**self).export_save(handle)
    }

    fn flush_audio(&mut self, handle: CoreHandle) -> Result<usize, CoreError> {
        (**self).flush_audio(handle)
    }

    fn audio_buffer_pointer(&mut self) -> Result<Ptr, CoreError> {
        (**self).audio_buffer_pointer()
    }

    fn memory(&self) -> &[u8] {
        (**self).memory()
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        (**self).memory_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_events_decode() {
        let events = StepEvents::from_bits(0b101);
        assert!(events.contains(StepEvents::NEW_FRAME));
        assert!(!events.contains(StepEvents::AUDIO_BUFFER_FULL));
        assert!(events.contains(StepEvents::TICKS_REACHED));
        assert!(!StepEvents::empty().contains(StepEvents::NEW_FRAME));
    }

    #[test]
    fn test_step_events_union() {
        let events = StepEvents::NEW_FRAME | StepEvents::AUDIO_BUFFER_FULL;
        assert_eq!(events.bits(), 3);
        assert!(events.contains(StepEvents::NEW_FRAME | StepEvents::AUDIO_BUFFER_FULL));
    }

    #[test]
    fn test_core_error_display() {
        let err = CoreError::OutOfBounds { ptr: 0x10, len: 4 };
        assert_eq!(
            err.to_string(),
            "Linear memory access out of bounds (ptr 0x00000010, len 4)"
        );
        assert_eq!(
            CoreError::AllocationFailed { size: 8192 }.to_string(),
            "Core refused to allocate 8192 bytes"
        );
    }
}
