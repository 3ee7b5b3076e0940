// Audio module - Core audio scheduling and playback
//
// This module provides:
// - AudioChunk: one flushed block of core PCM
// - AudioOutput: a clocked output that plays chunks at given times
// - AudioScheduler: lays chunks end to end on the output clock
// - CpalAudioOutput (feature "audio"): device output using cpal

#[cfg(feature = "audio")]
pub mod output;
pub mod scheduler;

#[cfg(feature = "audio")]
pub use output::CpalAudioOutput;
pub use scheduler::{AudioScheduler, ScheduleOutcome, SchedulerStats};

/// One block of PCM flushed from the core
///
/// Immutable once built. Samples are interleaved when `channels > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Mono chunk
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Samples per channel
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Playback length in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }
}

/// Audio output failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// No output device
    NoDevice,
    /// The device stream failed
    Stream(String),
    /// Chunk format does not match the output
    Format { expected: u32, actual: u32 },
    /// Too much audio is already queued
    QueueFull,
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoDevice => write!(f, "No output device available"),
            AudioError::Stream(msg) => write!(f, "Audio stream error: {}", msg),
            AudioError::Format { expected, actual } => write!(
                f,
                "Audio chunk is {} Hz, output runs at {} Hz",
                actual, expected
            ),
            AudioError::QueueFull => write!(f, "Audio queue is full"),
        }
    }
}

impl std::error::Error for AudioError {}

/// A clocked audio output
///
/// Times are seconds on the output's own clock. The clock only advances
/// while the output is running.
pub trait AudioOutput {
    /// Current output clock time, `None` if the output has no clock
    fn current_time(&self) -> Option<f64>;

    /// Whether the output is currently playing
    fn is_running(&self) -> bool;

    /// Start or continue playback
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Pause playback and the clock
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Play `chunk` starting at clock time `start`
    fn play_at(&mut self, chunk: AudioChunk, start: f64) -> Result<(), AudioError>;
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn current_time(&self) -> Option<f64> {
        (**self).current_time()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        (**self).resume()
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        (**self).suspend()
    }

    fn play_at(&mut self, chunk: AudioChunk, start: f64) -> Result<(), AudioError> {
        (**self).play_at(chunk, start)
    }
}

/// Output used when audio is disabled; it has no clock
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudioOutput;

impl AudioOutput for NullAudioOutput {
    fn current_time(&self) -> Option<f64> {
        None
    }

    fn is_running(&self) -> bool {
        false
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_at(&mut self, _chunk: AudioChunk, _start: f64) -> Result<(), AudioError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::mono(vec![0.0; 441], 44_100);
        assert_eq!(chunk.frame_count(), 441);
        assert!((chunk.duration() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_stereo_chunk_frames() {
        let chunk = AudioChunk::new(vec![0.0; 10], 48_000, 2);
        assert_eq!(chunk.frame_count(), 5);
        assert_eq!(chunk.channels(), 2);
    }

    #[test]
    fn test_empty_chunk() {
        assert!(AudioChunk::mono(Vec::new(), 44_100).is_empty());
        assert_eq!(AudioChunk::mono(vec![1.0], 0).duration(), 0.0);
    }

    #[test]
    fn test_null_output_has_no_clock() {
        let mut output = NullAudioOutput;
        assert_eq!(output.current_time(), None);
        assert!(!output.is_running());
        assert!(output.resume().is_ok());
    }
}
