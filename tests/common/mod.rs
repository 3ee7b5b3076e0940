// Common test utilities for host integration tests
//
// This module provides a scriptable in-process core, a loader that can be
// held back at chosen points, recording storage and audio outputs, and
// ROM image builders.

#![allow(dead_code)]

use emu_host::audio::{AudioChunk, AudioError, AudioOutput};
use emu_host::core::{CoreError, CoreHandle, CoreLoader, CoreModule, Ptr, StepEvents};
use emu_host::display::{DisplaySurface, FrameView};
use emu_host::persistence::{StorageRequest, StorageSink};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Size of the fake core's linear memory
pub const MEMORY_SIZE: usize = 1 << 20;

/// Where the fake core keeps its frame
pub const FRAME_PTR: Ptr = 0x1000;

/// Where the fake core keeps its audio samples
pub const AUDIO_PTR: Ptr = 0x4_0000;

/// Where the fake core keeps its save image
pub const SAVE_PTR: Ptr = 0x5_0000;

const HEAP_START: Ptr = 0x8_0000;

/// Handle the fake core issues
pub const FAKE_HANDLE: CoreHandle = CoreHandle(42);

/// Every call the host made into a fake core
#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub loads: u32,
    pub allocations: Vec<usize>,
    pub frees: u32,
    pub init_started: u32,
    pub inits: u32,
    pub releases: u32,
    pub steps: Vec<u64>,
    pub masks: Vec<u32>,
    pub exports: u32,
    pub rom_len: Option<usize>,
    pub save_len: Option<usize>,
}

pub type SharedLog = Arc<Mutex<CallLog>>;

pub fn new_log() -> SharedLog {
    Arc::new(Mutex::new(CallLog::default()))
}

pub fn snapshot(log: &SharedLog) -> CallLog {
    log.lock().unwrap().clone()
}

/// One-way latch a loader thread can be parked on
#[derive(Debug, Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap() = true;
        cvar.notify_all();
    }

    pub fn wait(&self) {
        let (lock, cvar) = &*self.inner;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cvar.wait(open).unwrap();
        }
    }
}

/// What a fake core reports from `step`
#[derive(Debug, Clone, Copy)]
pub struct CoreBehavior {
    /// Report a frame on every step
    pub frames: bool,
    /// Report a full audio buffer of this many samples on every step
    pub audio_samples: usize,
    /// Trap in `step`
    pub trap_on_step: bool,
    /// Refuse the session
    pub reject_session: bool,
}

impl Default for CoreBehavior {
    fn default() -> Self {
        Self {
            frames: true,
            audio_samples: 0,
            trap_on_step: false,
            reject_session: false,
        }
    }
}

/// In-process core with a flat memory and a bump allocator
pub struct FakeCore {
    memory: Vec<u8>,
    next: Ptr,
    cycles: u64,
    behavior: CoreBehavior,
    init_gate: Option<Gate>,
    log: SharedLog,
}

impl FakeCore {
    pub fn new(log: SharedLog, behavior: CoreBehavior) -> Self {
        let mut memory = vec![0u8; MEMORY_SIZE];
        memory[SAVE_PTR as usize..SAVE_PTR as usize + 8192].fill(0x5A);
        Self {
            memory,
            next: HEAP_START,
            cycles: 0,
            behavior,
            init_gate: None,
            log,
        }
    }

    /// Park `initialize_session` until the gate opens
    pub fn with_init_gate(mut self, gate: Gate) -> Self {
        self.init_gate = Some(gate);
        self
    }
}

impl CoreModule for FakeCore {
    fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError> {
        self.log.lock().unwrap().allocations.push(size);
        let ptr = self.next;
        if ptr as usize + size > MEMORY_SIZE {
            return Err(CoreError::AllocationFailed { size });
        }
        self.next += size as Ptr;
        Ok(ptr)
    }

    fn free(&mut self, _ptr: Ptr) -> Result<(), CoreError> {
        self.log.lock().unwrap().frees += 1;
        Ok(())
    }

    fn initialize_session(
        &mut self,
        rom: (Ptr, usize),
        save: Option<(Ptr, usize)>,
    ) -> Result<CoreHandle, CoreError> {
        self.log.lock().unwrap().init_started += 1;
        if let Some(gate) = &self.init_gate {
            gate.wait();
        }
        let mut log = self.log.lock().unwrap();
        log.inits += 1;
        log.rom_len = Some(rom.1);
        log.save_len = save.map(|(_, len)| len);
        if self.behavior.reject_session {
            return Err(CoreError::SessionRejected);
        }
        Ok(FAKE_HANDLE)
    }

    fn release_session(&mut self, _handle: CoreHandle) -> Result<(), CoreError> {
        self.log.lock().unwrap().releases += 1;
        Ok(())
    }

    fn step(&mut self, _handle: CoreHandle, target: u64) -> Result<StepEvents, CoreError> {
        self.log.lock().unwrap().steps.push(target);
        if self.behavior.trap_on_step {
            return Err(CoreError::Trap {
                export: "emulate_until",
                message: "unreachable executed".to_string(),
            });
        }
        self.cycles = target;
        let mut events = StepEvents::TICKS_REACHED;
        if self.behavior.frames {
            events = events | StepEvents::NEW_FRAME;
        }
        if self.behavior.audio_samples > 0 {
            events = events | StepEvents::AUDIO_BUFFER_FULL;
        }
        Ok(events)
    }

    fn current_cycle_count(&mut self, _handle: CoreHandle) -> Result<u64, CoreError> {
        Ok(self.cycles)
    }

    fn frame_buffer_pointer(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
        Ok(FRAME_PTR)
    }

    fn set_input_mask(&mut self, _handle: CoreHandle, mask: u32) -> Result<(), CoreError> {
        self.log.lock().unwrap().masks.push(mask);
        Ok(())
    }

    fn export_save(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
        self.log.lock().unwrap().exports += 1;
        Ok(SAVE_PTR)
    }

    fn flush_audio(&mut self, _handle: CoreHandle) -> Result<usize, CoreError> {
        Ok(self.behavior.audio_samples)
    }

    fn audio_buffer_pointer(&mut self) -> Result<Ptr, CoreError> {
        Ok(AUDIO_PTR)
    }

    fn memory(&self) -> &[u8] {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

/// Loader producing `FakeCore`s, optionally held back by gates
#[derive(Clone)]
pub struct FakeLoader {
    pub log: SharedLog,
    pub behavior: CoreBehavior,
    /// Held before the module is returned
    pub load_gate: Option<Gate>,
    /// Held inside `initialize_session`
    pub init_gate: Option<Gate>,
    /// Fail the load itself
    pub fail_load: bool,
}

impl FakeLoader {
    pub fn new(log: SharedLog) -> Self {
        Self {
            log,
            behavior: CoreBehavior::default(),
            load_gate: None,
            init_gate: None,
            fail_load: false,
        }
    }

    pub fn with_behavior(mut self, behavior: CoreBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_load_gate(mut self, gate: Gate) -> Self {
        self.load_gate = Some(gate);
        self
    }

    pub fn with_init_gate(mut self, gate: Gate) -> Self {
        self.init_gate = Some(gate);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail_load = true;
        self
    }
}

impl CoreLoader for FakeLoader {
    fn load(&self) -> Result<Box<dyn CoreModule>, CoreError> {
        self.log.lock().unwrap().loads += 1;
        if let Some(gate) = &self.load_gate {
            gate.wait();
        }
        if self.fail_load {
            return Err(CoreError::Load("no such module".to_string()));
        }
        let mut core = FakeCore::new(Arc::clone(&self.log), self.behavior);
        if let Some(gate) = &self.init_gate {
            core = core.with_init_gate(gate.clone());
        }
        Ok(Box::new(core))
    }
}

/// Storage sink that keeps every request
#[derive(Clone, Default)]
pub struct RecordingStorage {
    pub requests: Arc<Mutex<Vec<StorageRequest>>>,
}

impl RecordingStorage {
    pub fn requests(&self) -> Vec<StorageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl StorageSink for RecordingStorage {
    fn submit(&mut self, request: StorageRequest) {
        self.requests.lock().unwrap().push(request);
    }
}

/// Audio output state shared with the test
#[derive(Debug, Default)]
pub struct ManualAudioState {
    pub now: Option<f64>,
    pub running: bool,
    pub resumes: u32,
    pub played: Vec<(f64, usize)>,
}

/// Audio output with a hand-driven clock
#[derive(Clone, Default)]
pub struct ManualAudio {
    pub state: Arc<Mutex<ManualAudioState>>,
}

impl ManualAudio {
    /// Suspended output whose clock reads `now`
    pub fn at(now: f64) -> Self {
        let audio = Self::default();
        audio.state.lock().unwrap().now = Some(now);
        audio
    }

    pub fn set_now(&self, now: f64) {
        self.state.lock().unwrap().now = Some(now);
    }

    pub fn played(&self) -> Vec<(f64, usize)> {
        self.state.lock().unwrap().played.clone()
    }

    pub fn is_running_now(&self) -> bool {
        self.state.lock().unwrap().running
    }

    pub fn resumes(&self) -> u32 {
        self.state.lock().unwrap().resumes
    }
}

impl AudioOutput for ManualAudio {
    fn current_time(&self) -> Option<f64> {
        self.state.lock().unwrap().now
    }

    fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let mut state = self.state.lock().unwrap();
        state.running = true;
        state.resumes += 1;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.state.lock().unwrap().running = false;
        Ok(())
    }

    fn play_at(&mut self, chunk: AudioChunk, start: f64) -> Result<(), AudioError> {
        self.state
            .lock()
            .unwrap()
            .played
            .push((start, chunk.frame_count()));
        Ok(())
    }
}

/// Display surface counting presented frames
#[derive(Debug, Default)]
pub struct CountingSurface {
    pub frames: u32,
    pub last_size: Option<(u32, u32)>,
}

impl DisplaySurface for CountingSurface {
    fn present(&mut self, frame: FrameView<'_>) {
        self.frames += 1;
        self.last_size = Some((frame.width(), frame.height()));
    }
}

/// Build an iNES image whose length matches its header
pub fn nes_rom(mapper: u16, prg_banks: u8, chr_banks: u8, trainer: bool) -> Vec<u8> {
    let mut len = 16 + prg_banks as usize * 16 * 1024 + chr_banks as usize * 8 * 1024;
    if trainer {
        len += 512;
    }
    let mut rom = vec![0u8; len];
    rom[0..4].copy_from_slice(&[0x4E, 0x45, 0x53, 0x1A]);
    rom[4] = prg_banks;
    rom[5] = chr_banks;
    rom[6] = (((mapper & 0x0F) as u8) << 4) | if trainer { 0x04 } else { 0 };
    rom[7] = (mapper & 0xF0) as u8;
    rom[8] = ((mapper >> 8) & 0x0F) as u8;
    rom
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
