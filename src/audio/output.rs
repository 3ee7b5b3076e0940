// Audio output - Timed chunk playback using cpal
//
// The output clock is the number of frames the device callback has
// rendered, so it stops while the stream is suspended. Chunks are placed
// on that clock; gaps play as silence and the already-passed part of a
// late chunk is skipped.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{AudioChunk, AudioError, AudioOutput};

/// A chunk placed on the frame timeline
#[derive(Debug)]
struct Placed {
    start_frame: u64,
    samples: Vec<f32>,
}

impl Placed {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Frame clock and pending chunks shared with the device callback
#[derive(Debug)]
pub(crate) struct Timeline {
    sample_rate: u32,
    channels: u16,
    frames_played: u64,
    running: bool,
    queue: VecDeque<Placed>,
    max_queued_frames: u64,
}

impl Timeline {
    pub(crate) fn new(sample_rate: u32, channels: u16, max_queued_frames: u64) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            frames_played: 0,
            running: false,
            queue: VecDeque::new(),
            max_queued_frames,
        }
    }

    fn seconds(&self) -> f64 {
        self.frames_played as f64 / self.sample_rate as f64
    }

    fn queued_frames(&self) -> u64 {
        self.queue
            .back()
            .map(|last| last.end_frame().saturating_sub(self.frames_played))
            .unwrap_or(0)
    }

    fn place(&mut self, chunk: AudioChunk, start: f64) -> Result<(), AudioError> {
        if chunk.sample_rate() != self.sample_rate {
            return Err(AudioError::Format {
                expected: self.sample_rate,
                actual: chunk.sample_rate(),
            });
        }
        if self.queued_frames() + chunk.frame_count() as u64 > self.max_queued_frames {
            return Err(AudioError::QueueFull);
        }

        let start_frame = (start.max(0.0) * self.sample_rate as f64).round() as u64;
        let samples = if chunk.channels() == 1 {
            chunk.into_samples()
        } else {
            // keep the first channel; the core only produces mono
            let channels = chunk.channels() as usize;
            chunk.samples().iter().step_by(channels).copied().collect()
        };
        self.queue.push_back(Placed {
            start_frame,
            samples,
        });
        Ok(())
    }

    /// Fill an interleaved device buffer and advance the clock
    pub(crate) fn render(&mut self, out: &mut [f32]) {
        if !self.running {
            out.fill(0.0);
            return;
        }

        for frame in out.chunks_mut(self.channels as usize) {
            let now = self.frames_played;
            while self.queue.front().is_some_and(|c| c.end_frame() <= now) {
                self.queue.pop_front();
            }
            let sample = match self.queue.front() {
                Some(c) if c.start_frame <= now => c.samples[(now - c.start_frame) as usize],
                _ => 0.0,
            };
            frame.fill(sample);
            self.frames_played += 1;
        }
    }
}

/// Audio output on the default cpal device
///
/// Starts suspended; call `resume` after a user gesture.
pub struct CpalAudioOutput {
    stream: Stream,
    timeline: Arc<Mutex<Timeline>>,
}

impl CpalAudioOutput {
    /// Open the default output device
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Rate the stream runs at (the core's rate)
    /// * `max_queue_ms` - Most audio that may be queued ahead of the clock
    pub fn new(sample_rate: u32, max_queue_ms: u32) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        println!("Audio device: {}", device.name().unwrap_or_default());

        let channels = device
            .default_output_config()
            .map(|c| c.channels())
            .unwrap_or(2);
        let stream_config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let max_frames = u64::from(max_queue_ms) * u64::from(sample_rate) / 1000;
        let timeline = Arc::new(Mutex::new(Timeline::new(sample_rate, channels, max_frames)));
        let callback_timeline = Arc::clone(&timeline);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    match callback_timeline.lock() {
                        Ok(mut timeline) => timeline.render(data),
                        Err(_) => data.fill(0.0),
                    }
                },
                move |err| {
                    eprintln!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::Stream(format!("Failed to build audio stream: {}", e)))?;

        // cpal streams may start playing on creation
        stream
            .pause()
            .map_err(|e| AudioError::Stream(format!("Failed to pause audio stream: {}", e)))?;

        println!(
            "Audio output initialized: {} Hz, {} channel(s)",
            sample_rate, channels
        );

        Ok(Self { stream, timeline })
    }

    fn with_timeline<R>(&self, f: impl FnOnce(&mut Timeline) -> R) -> Result<R, AudioError> {
        let mut timeline = self
            .timeline
            .lock()
            .map_err(|_| AudioError::Stream("audio timeline poisoned".to_string()))?;
        Ok(f(&mut timeline))
    }
}

impl AudioOutput for CpalAudioOutput {
    fn current_time(&self) -> Option<f64> {
        self.with_timeline(|t| t.seconds()).ok()
    }

    fn is_running(&self) -> bool {
        self.with_timeline(|t| t.running).unwrap_or(false)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::Stream(format!("Failed to resume audio: {}", e)))?;
        self.with_timeline(|t| t.running = true)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.with_timeline(|t| t.running = false)?;
        self.stream
            .pause()
            .map_err(|e| AudioError::Stream(format!("Failed to pause audio: {}", e)))
    }

    fn play_at(&mut self, chunk: AudioChunk, start: f64) -> Result<(), AudioError> {
        self.with_timeline(|t| t.place(chunk, start))?
    }
}
