// Persistence - Auto-save and thumbnail capture
//
// Two timers run alongside the pacer, both polled from the frame loop:
// a repeating auto-save that exports the battery save region, and a
// one-shot capture that turns the current frame into a thumbnail. Writes
// go to a `StorageSink` and never block the caller.

pub mod storage;
pub mod thumbnail;

pub use storage::{
    BackgroundStorage, DiscardStorage, FileStorage, GameMetadata, SaveStorage, SlotInfo, StorageError,
    StorageReport, StorageRequest, StorageSink,
};
pub use thumbnail::{encode_png, ThumbnailError};

use crate::bridge::BufferBridge;
use crate::core::{CoreError, CoreHandle, CoreModule};
use crate::logger::Logger;
use std::time::Duration;

/// Default auto-save period
pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay before the thumbnail capture
pub const DEFAULT_CAPTURE_DELAY: Duration = Duration::from_millis(10_000);

/// Persistence settings for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    pub game_id: String,
    /// Slot auto-saves are written to; no slot disables auto-save
    pub slot: Option<u32>,
    pub autosave_interval: Duration,
    pub capture_delay: Duration,
    /// Take a thumbnail once `capture_delay` has passed
    pub capture_enabled: bool,
}

impl PersistenceConfig {
    pub fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            slot: Some(0),
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
            capture_delay: DEFAULT_CAPTURE_DELAY,
            capture_enabled: false,
        }
    }

    pub fn with_slot(mut self, slot: Option<u32>) -> Self {
        self.slot = slot;
        self
    }

    pub fn with_capture(mut self, enabled: bool) -> Self {
        self.capture_enabled = enabled;
        self
    }
}

/// What one poll did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// A save was submitted to storage
    pub saved: bool,
    /// The auto-save was due but extraction failed
    pub save_skipped: bool,
    /// A thumbnail was submitted to storage
    pub captured: bool,
    /// The capture was due but failed; it will not be retried
    pub capture_failed: bool,
}

/// Drives the auto-save and capture timers
#[derive(Debug, Clone)]
pub struct PersistenceBridge {
    config: PersistenceConfig,
    save_size: usize,
    next_autosave: Option<Duration>,
    capture_at: Option<Duration>,
    armed: bool,
    cancelled: bool,
    saves_written: u64,
}

impl PersistenceBridge {
    /// # Arguments
    ///
    /// * `config` - Timer settings and storage keys
    /// * `save_size` - Size of the core's save region, 0 if there is none
    pub fn new(config: PersistenceConfig, save_size: usize) -> Self {
        Self {
            config,
            save_size,
            next_autosave: None,
            capture_at: None,
            armed: false,
            cancelled: false,
            saves_written: 0,
        }
    }

    /// Start both timers relative to `now`
    ///
    /// Called when the session starts; `poll` arms lazily otherwise.
    pub fn arm(&mut self, now: Duration) {
        if self.armed || self.cancelled {
            return;
        }
        self.armed = true;
        if self.autosave_enabled() {
            self.next_autosave = Some(now + self.config.autosave_interval);
        }
        if self.config.capture_enabled {
            self.capture_at = Some(now + self.config.capture_delay);
        }
    }

    /// Stop both timers for good
    pub fn cancel(&mut self) {
        self.cancelled = true;
        self.next_autosave = None;
        self.capture_at = None;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Auto-save needs both a save region and a slot
    pub fn autosave_enabled(&self) -> bool {
        self.save_size > 0 && self.config.slot.is_some()
    }

    pub fn next_autosave(&self) -> Option<Duration> {
        self.next_autosave
    }

    /// Pending capture time, `None` once it has fired
    pub fn capture_at(&self) -> Option<Duration> {
        self.capture_at
    }

    pub fn saves_written(&self) -> u64 {
        self.saves_written
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Fire whichever timers are due at `now`
    ///
    /// Extraction and encoding failures are logged and contained here;
    /// they never end the session.
    pub fn poll(
        &mut self,
        now: Duration,
        core: &mut dyn CoreModule,
        handle: CoreHandle,
        screen: (u32, u32),
        sink: &mut dyn StorageSink,
        logger: &mut Logger,
    ) -> PollReport {
        let mut report = PollReport::default();
        if self.cancelled {
            return report;
        }
        self.arm(now);

        if let Some(due) = self.next_autosave {
            if now >= due {
                let mut next = due + self.config.autosave_interval;
                if next <= now {
                    next = now + self.config.autosave_interval;
                }
                self.next_autosave = Some(next);

                match self.extract_save(core, handle) {
                    Ok(bytes) => {
                        let slot = self.config.slot.unwrap_or_default();
                        logger.debug(format!(
                            "Auto-save: {} bytes to {} slot {}",
                            bytes.len(),
                            self.config.game_id,
                            slot
                        ));
                        sink.submit(StorageRequest::Save {
                            game_id: self.config.game_id.clone(),
                            slot,
                            bytes,
                        });
                        self.saves_written += 1;
                        report.saved = true;
                    }
                    Err(e) => {
                        logger.warn(format!("Auto-save skipped: {}", e));
                        report.save_skipped = true;
                    }
                }
            }
        }

        if let Some(due) = self.capture_at {
            if now >= due {
                self.capture_at = None;
                match capture_thumbnail(core, handle, screen) {
                    Ok(image) => {
                        logger.info(format!(
                            "Captured thumbnail for {} ({} bytes)",
                            self.config.game_id,
                            image.len()
                        ));
                        sink.submit(StorageRequest::Thumbnail {
                            game_id: self.config.game_id.clone(),
                            image,
                        });
                        report.captured = true;
                    }
                    Err(e) => {
                        logger.warn(format!("Thumbnail capture failed: {}", e));
                        report.capture_failed = true;
                    }
                }
            }
        }

        report
    }

    fn extract_save(
        &self,
        core: &mut dyn CoreModule,
        handle: CoreHandle,
    ) -> Result<Vec<u8>, CoreError> {
        let ptr = core.export_save(handle)?;
        BufferBridge::new(core).read_bytes(ptr, self.save_size)
    }
}

fn capture_thumbnail(
    core: &mut dyn CoreModule,
    handle: CoreHandle,
    screen: (u32, u32),
) -> Result<Vec<u8>, String> {
    let ptr = core.frame_buffer_pointer(handle).map_err(|e| e.to_string())?;
    let bridge = BufferBridge::new(core);
    let frame = bridge
        .read_pixels(ptr, screen.0, screen.1)
        .map_err(|e| e.to_string())?
        .to_frame_buffer();
    encode_png(&frame).map_err(|e| e.to_string())
}
