// WasmCore - CoreModule backed by a wasmtime instance
//
// Export names are configurable; the defaults are the NES core's table.
// Unknown imports are satisfied with trapping stubs so a core compiled
// against a libc shim still instantiates as long as it never calls them.

use super::{CoreError, CoreHandle, CoreModule, Ptr, StepEvents};
use serde::{Deserialize, Serialize};
use std::path::Path;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams, WasmResults};

/// Names of the exports a core module provides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportNames {
    pub memory: String,
    /// Called once after instantiation if present
    pub initialize: Option<String>,
    pub allocate: String,
    pub free: String,
    pub initialize_session: String,
    pub release_session: String,
    pub step: String,
    pub current_cycle_count: String,
    pub frame_buffer_pointer: String,
    pub set_input_mask: String,
    pub export_save: String,
    pub flush_audio: String,
    pub audio_buffer_pointer: String,
}

impl ExportNames {
    /// Export table of the NES core
    pub fn nes() -> Self {
        Self {
            memory: "memory".to_string(),
            initialize: Some("initialize".to_string()),
            allocate: "create_buffer".to_string(),
            free: "free_buffer".to_string(),
            initialize_session: "create_nes".to_string(),
            release_session: "free_nes".to_string(),
            step: "emulate_until".to_string(),
            current_cycle_count: "get_total_cycles".to_string(),
            frame_buffer_pointer: "get_framebuffer_wasm".to_string(),
            set_input_mask: "set_keys".to_string(),
            export_save: "write_save".to_string(),
            flush_audio: "flush_audio_samples".to_string(),
            audio_buffer_pointer: "get_audio_buffer".to_string(),
        }
    }
}

impl Default for ExportNames {
    fn default() -> Self {
        Self::nes()
    }
}

/// A core module instantiated in wasmtime
pub struct WasmCore {
    store: Store<()>,
    memory: Memory,
    allocate: TypedFunc<u32, u32>,
    free: TypedFunc<u32, ()>,
    initialize_session: TypedFunc<(u32, u32, u32, u32), u32>,
    release_session: TypedFunc<u32, ()>,
    step: TypedFunc<(u32, u64), u32>,
    current_cycle_count: TypedFunc<u32, u64>,
    frame_buffer_pointer: TypedFunc<u32, u32>,
    set_input_mask: TypedFunc<(u32, u32), ()>,
    export_save: TypedFunc<u32, u32>,
    flush_audio: TypedFunc<u32, u32>,
    audio_buffer_pointer: TypedFunc<(), u32>,
}

impl WasmCore {
    /// Compile and instantiate a core from a `.wasm` file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the compiled module
    /// * `names` - Export table to bind
    pub fn from_file<P: AsRef<Path>>(path: P, names: &ExportNames) -> Result<Self, CoreError> {
        let bytes = std::fs::read(path.as_ref()).map_err(|e| {
            CoreError::Load(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_bytes(&bytes, names)
    }

    /// Compile and instantiate a core from module bytes (binary or text format)
    pub fn from_bytes(bytes: &[u8], names: &ExportNames) -> Result<Self, CoreError> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(|e| CoreError::Load(e.to_string()))?;

        let mut linker: Linker<()> = Linker::new(&engine);
        linker
            .define_unknown_imports_as_traps(&module)
            .map_err(|e| CoreError::Load(e.to_string()))?;

        let mut store = Store::new(&engine, ());
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| CoreError::Load(e.to_string()))?;

        let memory = instance
            .get_memory(&mut store, &names.memory)
            .ok_or_else(|| CoreError::MissingExport(names.memory.clone()))?;

        if let Some(init) = &names.initialize {
            if let Ok(func) = instance.get_typed_func::<(), ()>(&mut store, init) {
                func.call(&mut store, ()).map_err(|e| CoreError::Trap {
                    export: "initialize",
                    message: e.to_string(),
                })?;
            }
        }

        Ok(Self {
            allocate: bind(&instance, &mut store, &names.allocate)?,
            free: bind(&instance, &mut store, &names.free)?,
            initialize_session: bind(&instance, &mut store, &names.initialize_session)?,
            release_session: bind(&instance, &mut store, &names.release_session)?,
            step: bind(&instance, &mut store, &names.step)?,
            current_cycle_count: bind(&instance, &mut store, &names.current_cycle_count)?,
            frame_buffer_pointer: bind(&instance, &mut store, &names.frame_buffer_pointer)?,
            set_input_mask: bind(&instance, &mut store, &names.set_input_mask)?,
            export_save: bind(&instance, &mut store, &names.export_save)?,
            flush_audio: bind(&instance, &mut store, &names.flush_audio)?,
            audio_buffer_pointer: bind(&instance, &mut store, &names.audio_buffer_pointer)?,
            memory,
            store,
        })
    }
}

fn bind<P, R>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<TypedFunc<P, R>, CoreError>
where
    P: WasmParams,
    R: WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|e| CoreError::MissingExport(format!("{} ({})", name, e)))
}

fn trap(export: &'static str) -> impl FnOnce(wasmtime::Error) -> CoreError {
    move |e| CoreError::Trap {
        export,
        message: e.to_string(),
    }
}

fn size_u32(size: usize) -> Result<u32, CoreError> {
    u32::try_from(size).map_err(|_| CoreError::AllocationFailed { size })
}

impl CoreModule for WasmCore {
    fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError> {
        let ptr = self
            .allocate
            .call(&mut self.store, size_u32(size)?)
            .map_err(trap("allocate"))?;
        if ptr == 0 {
            return Err(CoreError::AllocationFailed { size });
        }
        Ok(ptr)
    }

    fn free(&mut self, ptr: Ptr) -> Result<(), CoreError> {
        self.free.call(&mut self.store, ptr).map_err(trap("free"))
    }

    fn initialize_session(
        &mut self,
        rom: (Ptr, usize),
        save: Option<(Ptr, usize)>,
    ) -> Result<CoreHandle, CoreError> {
        let (save_ptr, save_len) = save.unwrap_or((0, 0));
        let handle = self
            .initialize_session
            .call(
                &mut self.store,
                (rom.0, size_u32(rom.1)?, save_ptr, size_u32(save_len)?),
            )
            .map_err(trap("initialize_session"))?;
        if handle == 0 {
            return Err(CoreError::SessionRejected);
        }
        Ok(CoreHandle(handle))
    }

    fn release_session(&mut self, handle: CoreHandle) -> Result<(), CoreError> {
        self.release_session
            .call(&mut self.store, handle.0)
            .map_err(trap("release_session"))
    }

    fn step(&mut self, handle: CoreHandle, target: u64) -> Result<StepEvents, CoreError> {
        self.step
            .call(&mut self.store, (handle.0, target))
            .map(StepEvents::from_bits)
            .map_err(trap("step"))
    }

    fn current_cycle_count(&mut self, handle: CoreHandle) -> Result<u64, CoreError> {
        self.current_cycle_count
            .call(&mut self.store, handle.0)
            .map_err(trap("current_cycle_count"))
    }

    fn frame_buffer_pointer(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError> {
        self.frame_buffer_pointer
            .call(&mut self.store, handle.0)
            .map_err(trap("frame_buffer_pointer"))
    }

    fn set_input_mask(&mut self, handle: CoreHandle, mask: u32) -> Result<(), CoreError> {
        self.set_input_mask
            .call(&mut self.store, (handle.0, mask))
            .map_err(trap("set_input_mask"))
    }

    fn export_save(&mut self, handle: CoreHandle) -> Result<Ptr, CoreError> {
        self.export_save
            .call(&mut self.store, handle.0)
            .map_err(trap("export_save"))
    }

    fn flush_audio(&mut self, handle: CoreHandle) -> Result<usize, CoreError> {
        self.flush_audio
            .call(&mut self.store, handle.0)
            .map(|count| count as usize)
            .map_err(trap("flush_audio"))
    }

    fn audio_buffer_pointer(&mut self) -> Result<Ptr, CoreError> {
        self.audio_buffer_pointer
            .call(&mut self.store, ())
            .map_err(trap("audio_buffer_pointer"))
    }

    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }
}
