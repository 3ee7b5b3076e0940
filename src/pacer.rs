// Clock pacer - Wall-clock time to emulated cycles
//
// Each display refresh calls `tick` with a monotonic timestamp. The
// elapsed time (clamped) is converted to cycles at the console's clock
// rate and the core is stepped to the new running total, with every event
// it reports along the way handed to a `PacerSink`.

use crate::audio::AudioChunk;
use crate::bridge::BufferBridge;
use crate::console::Console;
use crate::core::{CoreError, CoreHandle, CoreModule, StepEvents};
use crate::display::FrameView;
use crate::input::InputMask;
use std::time::Duration;

/// Longest frame delta converted to cycles; longer stalls are not caught up
pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

/// Most `step` calls one tick may make
pub const MAX_STEP_CALLS: u32 = 65_536;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Receives what the core produced during a tick
pub trait PacerSink {
    /// A new frame; the view is only valid during this call
    fn present(&mut self, frame: FrameView<'_>);

    /// A flushed audio block, in production order
    fn queue_audio(&mut self, chunk: AudioChunk);
}

/// Pacer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    Stopped,
    Running,
}

/// Wall-clock to cycle conversion progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacingState {
    /// Timestamp of the previous tick, unset before the first one
    pub previous_timestamp: Option<Duration>,
    /// Running total cycle target
    pub accumulated_cycles: u64,
    /// Sub-cycle remainder carried between ticks, in cycle-nanoseconds
    carry: u128,
}

impl PacingState {
    /// Convert `delta` to whole cycles at `clock_hz`, keeping the remainder
    fn advance(&mut self, delta: Duration, clock_hz: u64) -> u64 {
        let scaled = delta.as_nanos() * u128::from(clock_hz) + self.carry;
        self.carry = scaled % NANOS_PER_SEC;
        let cycles = (scaled / NANOS_PER_SEC) as u64;
        self.accumulated_cycles += cycles;
        cycles
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frame delta after clamping
    pub delta: Duration,
    /// The raw delta exceeded the maximum
    pub clamped: bool,
    /// Cycles added this tick
    pub cycles: u64,
    /// Running total target after this tick
    pub target: u64,
    /// Number of `step` calls made
    pub step_calls: u32,
    /// Frames presented
    pub frames: u32,
    /// Audio chunks queued
    pub audio_chunks: u32,
    /// The core's own cycle count after stepping, if it was stepped
    pub core_cycles: Option<u64>,
    /// Stepping stopped at `MAX_STEP_CALLS` before the target was reached
    pub hit_step_limit: bool,
}

/// Converts display refreshes into core steps
#[derive(Debug, Clone)]
pub struct ClockPacer {
    clock_hz: u64,
    screen: (u32, u32),
    sample_rate: u32,
    max_delta: Duration,
    state: PacerState,
    pacing: PacingState,
    ticks: u64,
}

impl ClockPacer {
    /// Pacer using the console's clock, resolution and audio rate
    pub fn new(console: Console) -> Self {
        Self::with_clock(console.clock_hz(), console.screen_size(), console.sample_rate())
    }

    pub fn with_clock(clock_hz: u64, screen: (u32, u32), sample_rate: u32) -> Self {
        Self {
            clock_hz,
            screen,
            sample_rate,
            max_delta: DEFAULT_MAX_FRAME_DELTA,
            state: PacerState::Stopped,
            pacing: PacingState::default(),
            ticks: 0,
        }
    }

    /// Set the clamp applied to frame deltas
    pub fn with_max_delta(mut self, max_delta: Duration) -> Self {
        self.max_delta = max_delta;
        self
    }

    /// Begin pacing; a fresh session starts from an unset timestamp
    pub fn start(&mut self) {
        if self.state == PacerState::Stopped {
            self.pacing = PacingState::default();
            self.state = PacerState::Running;
        }
    }

    /// Stop pacing; safe to call repeatedly
    pub fn shutdown(&mut self) {
        self.state = PacerState::Stopped;
    }

    pub fn state(&self) -> PacerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PacerState::Running
    }

    pub fn pacing(&self) -> &PacingState {
        &self.pacing
    }

    /// Ticks that reached the core
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn clock_hz(&self) -> u64 {
        self.clock_hz
    }

    pub fn max_delta(&self) -> Duration {
        self.max_delta
    }

    /// Run one pacing step
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Monotonic time of this display refresh
    /// * `core` - The core to step
    /// * `handle` - The session to step
    /// * `mask` - Input mask for this step
    /// * `sink` - Receives frames and audio
    ///
    /// # Returns
    ///
    /// A report of the step; a stopped pacer returns an empty report
    /// without touching the core
    pub fn tick(
        &mut self,
        timestamp: Duration,
        core: &mut dyn CoreModule,
        handle: CoreHandle,
        mask: InputMask,
        sink: &mut dyn PacerSink,
    ) -> Result<TickReport, CoreError> {
        let mut report = TickReport::default();
        if self.state == PacerState::Stopped {
            return Ok(report);
        }
        self.ticks += 1;

        let raw = match self.pacing.previous_timestamp {
            Some(previous) => timestamp.saturating_sub(previous),
            None => Duration::ZERO,
        };
        self.pacing.previous_timestamp = Some(timestamp);

        report.clamped = raw > self.max_delta;
        report.delta = raw.min(self.max_delta);
        report.cycles = self.pacing.advance(report.delta, self.clock_hz);
        report.target = self.pacing.accumulated_cycles;

        core.set_input_mask(handle, mask.bits())?;
        if report.cycles == 0 {
            return Ok(report);
        }

        loop {
            report.step_calls += 1;
            let events = core.step(handle, report.target)?;

            if events.contains(StepEvents::NEW_FRAME) {
                let ptr = core.frame_buffer_pointer(handle)?;
                let bridge = BufferBridge::new(&mut *core);
                let frame = bridge.read_pixels(ptr, self.screen.0, self.screen.1)?;
                sink.present(frame);
                report.frames += 1;
            }

            if events.contains(StepEvents::AUDIO_BUFFER_FULL) {
                let count = core.flush_audio(handle)?;
                let ptr = core.audio_buffer_pointer()?;
                let chunk = BufferBridge::new(&mut *core).read_samples(ptr, count, self.sample_rate)?;
                sink.queue_audio(chunk);
                report.audio_chunks += 1;
            }

            if events.contains(StepEvents::TICKS_REACHED) {
                break;
            }
            if report.step_calls >= MAX_STEP_CALLS {
                report.hit_step_limit = true;
                break;
            }
        }

        report.core_cycles = Some(core.current_cycle_count(handle)?);
        Ok(report)
    }
}
