// Audio scheduler - Gap-free placement of core audio on the output clock
//
// Chunks are laid end to end starting at `next_start_time`. If the output
// clock has already passed that point the timeline restarts a safety
// margin ahead of the clock.

use super::{AudioChunk, AudioError, AudioOutput};

/// Default lead applied after an underrun, in seconds
pub const DEFAULT_SAFETY_MARGIN: f64 = 0.1;

/// Why a chunk was not scheduled
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// The chunk had no samples
    Empty,
    /// The output has no clock
    NoClock,
    /// The output is suspended
    Suspended,
    /// The output refused the chunk
    Rejected(AudioError),
}

/// Result of one `schedule` call
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// Placed directly after the previous chunk
    Scheduled { start: f64 },
    /// The clock had overtaken the timeline; placed at `now + margin`
    Rescheduled { start: f64, behind_by: f64 },
    /// Not played
    Dropped(DropReason),
}

impl ScheduleOutcome {
    /// Start time if the chunk was played
    pub fn start(&self) -> Option<f64> {
        match self {
            ScheduleOutcome::Scheduled { start } | ScheduleOutcome::Rescheduled { start, .. } => {
                Some(*start)
            }
            ScheduleOutcome::Dropped(_) => None,
        }
    }
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub scheduled: u64,
    pub underruns: u64,
    pub dropped: u64,
}

/// Places audio chunks on an output's clock
pub struct AudioScheduler<O: AudioOutput> {
    output: O,
    next_start_time: f64,
    safety_margin: f64,
    stats: SchedulerStats,
}

impl<O: AudioOutput> AudioScheduler<O> {
    /// Create a scheduler whose timeline starts at the output's current time
    pub fn new(output: O) -> Self {
        let next_start_time = output.current_time().unwrap_or(0.0);
        Self {
            output,
            next_start_time,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            stats: SchedulerStats::default(),
        }
    }

    /// Set the underrun safety margin in seconds
    pub fn with_safety_margin(mut self, seconds: f64) -> Self {
        self.safety_margin = seconds.max(0.0);
        self
    }

    /// Schedule one chunk
    ///
    /// Chunks must arrive in production order. Empty chunks and chunks that
    /// arrive while the output is suspended or clockless are dropped, so
    /// nothing queues up while playback is not running.
    pub fn schedule(&mut self, chunk: AudioChunk) -> ScheduleOutcome {
        if chunk.is_empty() {
            return self.drop_chunk(DropReason::Empty);
        }
        let Some(now) = self.output.current_time() else {
            return self.drop_chunk(DropReason::NoClock);
        };
        if !self.output.is_running() {
            return self.drop_chunk(DropReason::Suspended);
        }

        let mut behind_by = None;
        if self.next_start_time < now {
            behind_by = Some(now - self.next_start_time);
            self.next_start_time = now + self.safety_margin;
        }

        let start = self.next_start_time;
        let duration = chunk.duration();
        if let Err(e) = self.output.play_at(chunk, start) {
            return self.drop_chunk(DropReason::Rejected(e));
        }
        self.next_start_time = start + duration;
        self.stats.scheduled += 1;

        match behind_by {
            Some(behind_by) => {
                self.stats.underruns += 1;
                ScheduleOutcome::Rescheduled { start, behind_by }
            }
            None => ScheduleOutcome::Scheduled { start },
        }
    }

    fn drop_chunk(&mut self, reason: DropReason) -> ScheduleOutcome {
        self.stats.dropped += 1;
        ScheduleOutcome::Dropped(reason)
    }

    /// Where the next chunk will start if the clock has not overtaken it
    pub fn next_start_time(&self) -> f64 {
        self.next_start_time
    }

    pub fn safety_margin(&self) -> f64 {
        self.safety_margin
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Resume a suspended output
    ///
    /// # Returns
    /// `true` if the output was suspended and is now running; a clockless
    /// output is never resumed
    pub fn resume_output(&mut self) -> Result<bool, AudioError> {
        if self.output.current_time().is_none() || self.output.is_running() {
            return Ok(false);
        }
        self.output.resume()?;
        Ok(true)
    }
}
