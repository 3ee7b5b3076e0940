// Host Benchmarks
// ROM validation and pacing-step throughput

use criterion::{criterion_group, criterion_main, Criterion};
use emu_host::audio::AudioChunk;
use emu_host::cartridge::validate_rom;
use emu_host::console::Console;
use emu_host::core::{CoreError, CoreHandle, CoreModule, Ptr, StepEvents};
use emu_host::display::{DisplaySurface, FrameBuffer, FrameView};
use emu_host::input::InputMask;
use emu_host::pacer::{ClockPacer, PacerSink};
use std::hint::black_box;
use std::time::Duration;

const FRAME_PTR: Ptr = 0;
const AUDIO_PTR: Ptr = 256 * 240 * 4;

/// Core that reports a frame and a full audio buffer on every step
struct BenchCore {
    memory: Vec<u8>,
    cycles: u64,
}

impl BenchCore {
    fn new() -> Self {
        Self {
            memory: vec![0u8; AUDIO_PTR as usize + 735 * 4],
            cycles: 0,
        }
    }
}

impl CoreModule for BenchCore {
    fn allocate(&mut self, size: usize) -> Result<Ptr, CoreError> {
        Err(CoreError::AllocationFailed { size })
    }

    fn free(&mut self, _ptr: Ptr) -> Result<(), CoreError> {
        Ok(())
    }

    fn initialize_session(
        &mut self,
        _rom: (Ptr, usize),
        _save: Option<(Ptr, usize)>,
    ) -> Result<CoreHandle, CoreError> {
        Ok(CoreHandle(1))
    }

    fn release_session(&mut self, _handle: CoreHandle) -> Result<(), CoreError> {
        Ok(())
    }

    fn step(&mut self, _handle: CoreHandle, target: u64) -> Result<StepEvents, CoreError> {
        self.cycles = target;
        Ok(StepEvents::NEW_FRAME | StepEvents::AUDIO_BUFFER_FULL | StepEvents::TICKS_REACHED)
    }

    fn current_cycle_count(&mut self, _handle: CoreHandle) -> Result<u64, CoreError> {
        Ok(self.cycles)
    }

    fn frame_buffer_pointer(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
        Ok(FRAME_PTR)
    }

    fn set_input_mask(&mut self, _handle: CoreHandle, _mask: u32) -> Result<(), CoreError> {
        Ok(())
    }

    fn export_save(&mut self, _handle: CoreHandle) -> Result<Ptr, CoreError> {
        Ok(0)
    }

    fn flush_audio(&mut self, _handle: CoreHandle) -> Result<usize, CoreError> {
        Ok(735)
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

struct BenchSink {
    frame: FrameBuffer,
    samples: usize,
}

impl PacerSink for BenchSink {
    fn present(&mut self, frame: FrameView<'_>) {
        self.frame.present(frame);
    }

    fn queue_audio(&mut self, chunk: AudioChunk) {
        self.samples += chunk.frame_count();
    }
}

fn nes_rom(mapper: u16, prg_banks: u8, chr_banks: u8) -> Vec<u8> {
    let mut rom = vec![0u8; 16 + prg_banks as usize * 16384 + chr_banks as usize * 8192];
    rom[0..4].copy_from_slice(&[0x4E, 0x45, 0x53, 0x1A]);
    rom[4] = prg_banks;
    rom[5] = chr_banks;
    rom[6] = ((mapper & 0x0F) as u8) << 4;
    rom[7] = (mapper & 0xF0) as u8;
    rom
}

/// Benchmark ROM validation
fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("rom_validation");

    let nrom = nes_rom(0, 2, 1);
    group.bench_function("nes_nrom", |b| {
        b.iter(|| validate_rom(Console::Nes, black_box(&nrom)))
    });

    let mmc3 = nes_rom(4, 32, 32);
    group.bench_function("nes_mmc3_large", |b| {
        b.iter(|| validate_rom(Console::Nes, black_box(&mmc3)))
    });

    let chip8 = vec![0u8; 3584];
    group.bench_function("chip8", |b| {
        b.iter(|| validate_rom(Console::Chip8, black_box(&chip8)))
    });

    group.finish();
}

/// Benchmark one pacing step with a frame and an audio flush
fn bench_pacing_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("pacing");

    group.bench_function("nes_tick_frame_and_audio", |b| {
        let mut core = BenchCore::new();
        let mut sink = BenchSink {
            frame: FrameBuffer::new(256, 240),
            samples: 0,
        };
        let mut pacer = ClockPacer::new(Console::Nes);
        pacer.start();
        let mut timestamp = Duration::ZERO;

        b.iter(|| {
            timestamp += Duration::from_micros(16_667);
            pacer
                .tick(
                    black_box(timestamp),
                    &mut core,
                    CoreHandle(1),
                    InputMask::EMPTY,
                    &mut sink,
                )
                .ok()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_validation, bench_pacing_step);
criterion_main!(benches);
