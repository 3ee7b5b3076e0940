// Emulator module - Session host
//
// `EmulatorHost` owns one game session from construction to shutdown:
// ROM validation, the asynchronous core load, pacing, audio scheduling,
// input and the persistence timers. Everything runs on the caller's
// thread except module loading, which happens on a loader thread and is
// fenced by a session epoch.

mod config;
mod epoch;
mod session;

pub use config::{
    AudioConfig, CoresConfig, HostConfig, LoggingConfig, PacingConfig, PersistenceSettings,
    VideoConfig, CONFIG_FILE,
};
pub use epoch::{EpochToken, SessionEpoch};
pub use session::{open_session, CoreSession};

use crate::audio::scheduler::DropReason;
use crate::audio::{AudioOutput, AudioScheduler, NullAudioOutput, ScheduleOutcome, SchedulerStats};
use crate::cartridge::{initial_save, validate_rom, RomError, RomInfo};
use crate::console::Console;
use crate::core::{CoreError, CoreHandle, CoreLoader};
use crate::display::{DisplaySurface, FrameView};
use crate::input::{
    ButtonSource, ControllerRegistry, GamepadEvent, GamepadMapping, InputAggregator, InputConfig,
    InputMask, KeyboardMapping,
};
use crate::logger::Logger;
use crate::pacer::{ClockPacer, PacerSink, TickReport, DEFAULT_MAX_FRAME_DELTA};
use crate::persistence::{
    DiscardStorage, PersistenceBridge, PersistenceConfig, PollReport, StorageSink,
};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::Duration;
use winit::keyboard::KeyCode;

/// Session failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The ROM failed validation; no core session was started
    Validation(RomError),
    /// The core failed to load, allocate, initialize or step
    Core(CoreError),
    /// The loader thread ended without producing a session
    LoaderStopped,
    /// The core was not ready in time
    Timeout(Duration),
    /// The session was shut down
    Stopped,
    /// The loader thread could not be started
    Spawn(String),
}

impl HostError {
    /// User-visible reason string
    pub fn reason(&self) -> String {
        match self {
            HostError::Validation(e) => e.reason(),
            other => other.to_string(),
        }
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::Validation(e) => write!(f, "Invalid ROM: {}", e),
            HostError::Core(e) => write!(f, "{}", e),
            HostError::LoaderStopped => write!(f, "Core loader stopped without a session"),
            HostError::Timeout(t) => write!(f, "Core not ready after {} ms", t.as_millis()),
            HostError::Stopped => write!(f, "Session has been shut down"),
            HostError::Spawn(msg) => write!(f, "Failed to start core loader: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

impl From<RomError> for HostError {
    fn from(e: RomError) -> Self {
        HostError::Validation(e)
    }
}

impl From<CoreError> for HostError {
    fn from(e: CoreError) -> Self {
        HostError::Core(e)
    }
}

/// Where a session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// The core is still loading
    Loading,
    /// The core session exists but pacing has not started
    Ready,
    /// Pacing
    Running,
    /// Loading failed or a fatal core error ended the session
    Failed,
    /// Shut down
    Stopped,
}

type LoadResult = Result<CoreSession, HostError>;

enum Phase {
    Loading(Receiver<LoadResult>),
    Ready(CoreSession),
    Failed(HostError),
    Stopped,
}

/// Collects the settings for a session before it is constructed
pub struct HostBuilder {
    console: Console,
    rom: Vec<u8>,
    save: Option<Vec<u8>>,
    keyboard: KeyboardMapping,
    gamepad: GamepadMapping,
    registry: ControllerRegistry,
    audio: Box<dyn AudioOutput>,
    safety_margin: f64,
    resume_audio_on_input: bool,
    storage: Box<dyn StorageSink>,
    persistence: PersistenceConfig,
    max_frame_delta: Duration,
    logger: Logger,
}

impl HostBuilder {
    /// Session for `rom` with the console's default bindings, no audio and
    /// no storage
    pub fn new(console: Console, rom: Vec<u8>) -> Self {
        Self {
            console,
            rom,
            save: None,
            keyboard: KeyboardMapping::for_console(console),
            gamepad: GamepadMapping::for_console(console),
            registry: ControllerRegistry::new(),
            audio: Box::new(NullAudioOutput),
            safety_margin: crate::audio::scheduler::DEFAULT_SAFETY_MARGIN,
            resume_audio_on_input: true,
            storage: Box::new(DiscardStorage),
            persistence: PersistenceConfig::new("default"),
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            logger: Logger::new(),
        }
    }

    /// Stored save bytes to start from
    pub fn with_save(mut self, save: Option<Vec<u8>>) -> Self {
        self.save = save;
        self
    }

    pub fn with_bindings(mut self, keyboard: KeyboardMapping, gamepad: GamepadMapping) -> Self {
        self.keyboard = keyboard;
        self.gamepad = gamepad;
        self
    }

    /// Bindings from an input configuration
    ///
    /// # Errors
    ///
    /// A key or button name in the configuration is unknown
    pub fn with_input_config(self, config: &InputConfig) -> Result<Self, String> {
        let keyboard = config.keyboard_mapping(self.console)?;
        let gamepad = config.gamepad_mapping(self.console)?;
        Ok(self.with_bindings(keyboard, gamepad))
    }

    /// Controllers already known to be connected
    pub fn with_registry(mut self, registry: ControllerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_audio(mut self, output: Box<dyn AudioOutput>) -> Self {
        self.audio = output;
        self
    }

    pub fn with_safety_margin(mut self, seconds: f64) -> Self {
        self.safety_margin = seconds;
        self
    }

    /// Resume a suspended audio output on key presses
    pub fn resume_audio_on_input(mut self, enabled: bool) -> Self {
        self.resume_audio_on_input = enabled;
        self
    }

    pub fn with_storage(mut self, storage: Box<dyn StorageSink>) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_persistence(mut self, config: PersistenceConfig) -> Self {
        self.persistence = config;
        self
    }

    pub fn with_max_frame_delta(mut self, max: Duration) -> Self {
        self.max_frame_delta = max;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Apply pacing, audio and persistence timing settings
    pub fn apply_config(mut self, config: &HostConfig) -> Self {
        self.max_frame_delta = config.pacing.max_frame_delta();
        self.safety_margin = config.audio.safety_margin();
        self.resume_audio_on_input = config.audio.resume_on_input;
        self.persistence.slot = config.persistence.save_slot;
        self.persistence.autosave_interval = config.persistence.autosave_interval();
        self.persistence.capture_delay = config.persistence.capture_delay();
        self.persistence.capture_enabled = config.persistence.capture_image;
        self
    }

    /// Validate the ROM and start loading the core
    ///
    /// Validation happens here, before the loader starts: an invalid ROM
    /// never reaches the core. The returned host is `Loading` until the
    /// loader thread hands over a session.
    ///
    /// # Errors
    ///
    /// `HostError::Validation` with the reason for a rejected ROM
    pub fn construct<L: CoreLoader>(self, loader: L) -> Result<EmulatorHost, HostError> {
        let HostBuilder {
            console,
            rom,
            save,
            keyboard,
            gamepad,
            registry,
            audio,
            safety_margin,
            resume_audio_on_input,
            storage,
            persistence,
            max_frame_delta,
            mut logger,
        } = self;

        let info = match validate_rom(console, &rom) {
            Ok(info) => info,
            Err(e) => {
                logger.error(format!("ROM rejected: {}", e.reason()));
                return Err(HostError::Validation(e));
            }
        };
        match info.mapper() {
            Some(mapper) => logger.info(format!(
                "ROM validated: {} ({} bytes, mapper {}, save {} bytes)",
                console,
                rom.len(),
                mapper,
                info.save_size
            )),
            None => logger.info(format!("ROM validated: {} ({} bytes)", console, rom.len())),
        }

        let save = initial_save(&info, save);
        let epoch = SessionEpoch::new();
        let token = epoch.token();
        let (sender, receiver) = mpsc::channel::<LoadResult>();

        let loader_thread = std::thread::Builder::new()
            .name("core-loader".to_string())
            .spawn(move || {
                match load_session(&loader, &token, &rom, save.as_deref()) {
                    // a failed send hands the session back and drops it,
                    // which releases the handle
                    Ok(Some(session)) => {
                        let _ = sender.send(Ok(session));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        let _ = sender.send(Err(e));
                    }
                }
            })
            .map_err(|e| HostError::Spawn(e.to_string()))?;

        let scheduler = AudioScheduler::new(audio).with_safety_margin(safety_margin);
        let pacer = ClockPacer::new(console).with_max_delta(max_frame_delta);

        Ok(EmulatorHost {
            console,
            rom_info: info,
            phase: Phase::Loading(receiver),
            epoch,
            pacer,
            scheduler,
            input: InputAggregator::new(keyboard, gamepad, registry),
            persistence: PersistenceBridge::new(persistence, info.save_size),
            storage,
            logger,
            resume_audio_on_input,
            listening: false,
            start_requested: false,
            shut_down: false,
            loader_thread: Some(loader_thread),
        })
    }
}

/// Load the module and open a session, bailing out once `token` goes stale
///
/// `Ok(None)` means the session was superseded; anything initialised by
/// then has already been released.
fn load_session(
    loader: &dyn CoreLoader,
    token: &EpochToken,
    rom: &[u8],
    save: Option<&[u8]>,
) -> Result<Option<CoreSession>, HostError> {
    let core = loader.load()?;
    if token.is_stale() {
        return Ok(None);
    }

    let session = open_session(core, rom, save)?;
    if token.is_stale() {
        drop(session);
        return Ok(None);
    }
    Ok(Some(session))
}

/// Pacer output routed to the display surface and the audio scheduler
struct HostSink<'a> {
    surface: &'a mut dyn DisplaySurface,
    scheduler: &'a mut AudioScheduler<Box<dyn AudioOutput>>,
    logger: &'a mut Logger,
}

impl PacerSink for HostSink<'_> {
    fn present(&mut self, frame: FrameView<'_>) {
        self.surface.present(frame);
    }

    fn queue_audio(&mut self, chunk: crate::audio::AudioChunk) {
        match self.scheduler.schedule(chunk) {
            ScheduleOutcome::Rescheduled { start, behind_by } => self.logger.debug(format!(
                "Audio underrun corrected: {:.1} ms behind, restarting at {:.3}s",
                behind_by * 1000.0,
                start
            )),
            ScheduleOutcome::Dropped(DropReason::Rejected(e)) => {
                self.logger.debug(format!("Audio chunk dropped: {}", e))
            }
            _ => {}
        }
    }
}

/// One running game session
pub struct EmulatorHost {
    console: Console,
    rom_info: RomInfo,
    phase: Phase,
    epoch: SessionEpoch,
    pacer: ClockPacer,
    scheduler: AudioScheduler<Box<dyn AudioOutput>>,
    input: InputAggregator,
    persistence: PersistenceBridge,
    storage: Box<dyn StorageSink>,
    logger: Logger,
    resume_audio_on_input: bool,
    listening: bool,
    start_requested: bool,
    shut_down: bool,
    loader_thread: Option<JoinHandle<()>>,
}

impl EmulatorHost {
    /// Start configuring a session
    pub fn builder(console: Console, rom: Vec<u8>) -> HostBuilder {
        HostBuilder::new(console, rom)
    }

    /// Pick up the loader's result if it has arrived
    pub fn poll_load(&mut self) -> HostState {
        let received = match &self.phase {
            Phase::Loading(receiver) => Some(receiver.try_recv()),
            _ => None,
        };
        match received {
            Some(Ok(result)) => self.finish_load(result),
            Some(Err(TryRecvError::Disconnected)) => self.finish_load(Err(HostError::LoaderStopped)),
            Some(Err(TryRecvError::Empty)) | None => {}
        }
        self.state()
    }

    /// Block until the core is ready, for at most `timeout`
    ///
    /// # Errors
    ///
    /// The load failure, `Timeout` if the core is still loading, or
    /// `Stopped` after shutdown
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), HostError> {
        let received = match &self.phase {
            Phase::Loading(receiver) => Some(receiver.recv_timeout(timeout)),
            _ => None,
        };
        match received {
            Some(Ok(result)) => self.finish_load(result),
            Some(Err(RecvTimeoutError::Timeout)) => return Err(HostError::Timeout(timeout)),
            Some(Err(RecvTimeoutError::Disconnected)) => {
                self.finish_load(Err(HostError::LoaderStopped))
            }
            None => {}
        }

        match &self.phase {
            Phase::Ready(_) => Ok(()),
            Phase::Failed(e) => Err(e.clone()),
            Phase::Stopped => Err(HostError::Stopped),
            Phase::Loading(_) => Err(HostError::Timeout(timeout)),
        }
    }

    fn finish_load(&mut self, result: LoadResult) {
        match result {
            Ok(session) => {
                self.logger.info(format!(
                    "Core module loaded, session ready (handle {})",
                    session.handle().0
                ));
                self.phase = Phase::Ready(session);
                if self.start_requested {
                    self.begin_pacing();
                }
            }
            Err(e) => {
                self.logger.error(format!("Session failed to start: {}", e));
                self.phase = Phase::Failed(e);
            }
        }
    }

    /// Attach input and start pacing
    ///
    /// Before the core is ready this only records the request; pacing
    /// begins when the load completes.
    pub fn start(&mut self) -> Result<(), HostError> {
        match &self.phase {
            Phase::Stopped => return Err(HostError::Stopped),
            Phase::Failed(e) => return Err(e.clone()),
            Phase::Loading(_) | Phase::Ready(_) => {}
        }
        self.listening = true;
        self.start_requested = true;
        if matches!(self.phase, Phase::Ready(_)) {
            self.begin_pacing();
        } else {
            self.logger
                .info("Start requested; pacing begins once the core is ready");
        }
        Ok(())
    }

    fn begin_pacing(&mut self) {
        if !self.pacer.is_running() {
            self.pacer.start();
            self.logger.info(format!(
                "Pacing started at {} Hz",
                self.pacer.clock_hz()
            ));
        }
    }

    /// Key pressed
    ///
    /// # Returns
    ///
    /// `true` if the key is bound
    pub fn on_key_down(&mut self, key: KeyCode) -> bool {
        if !self.listening {
            return false;
        }
        if self.resume_audio_on_input {
            self.resume_audio();
        }
        self.input.on_key_down(key)
    }

    /// Key released
    pub fn on_key_up(&mut self, key: KeyCode) -> bool {
        if !self.listening {
            return false;
        }
        self.input.on_key_up(key)
    }

    /// Resume a suspended audio output
    pub fn resume_audio(&mut self) {
        match self.scheduler.resume_output() {
            Ok(true) => self.logger.info("Audio resumed"),
            Ok(false) => {}
            Err(e) => self.logger.warn(format!("Failed to resume audio: {}", e)),
        }
    }

    /// Apply a controller connection change
    pub fn apply_gamepad_event(&mut self, event: GamepadEvent) {
        let primary_changed = self.input.apply_gamepad_event(event);
        match event {
            GamepadEvent::Connected(id) => {
                self.logger.info(format!("Controller {} connected", id))
            }
            GamepadEvent::Disconnected(id) => {
                self.logger.info(format!("Controller {} disconnected", id))
            }
        }
        if primary_changed {
            match self.input.primary_controller() {
                Some(id) => self
                    .logger
                    .info(format!("Controller {} is now the primary controller", id)),
                None => self.logger.info("No controller connected"),
            }
        }
    }

    /// Sample the primary controller's buttons
    pub fn poll_controller(&mut self, source: Option<&dyn ButtonSource>) -> InputMask {
        if !self.listening {
            return InputMask::EMPTY;
        }
        self.input.poll_controller(source)
    }

    /// Display refresh callback
    ///
    /// # Arguments
    ///
    /// * `timestamp` - Monotonic time of this refresh
    /// * `surface` - Receives every frame the core produces
    ///
    /// # Returns
    ///
    /// The pacing report, or `None` when no pacing step ran
    ///
    /// # Errors
    ///
    /// A core failure during stepping; the session is shut down first
    pub fn on_frame(
        &mut self,
        timestamp: Duration,
        surface: &mut dyn DisplaySurface,
    ) -> Result<Option<TickReport>, HostError> {
        self.poll_load();
        let Phase::Ready(session) = &mut self.phase else {
            return Ok(None);
        };
        if !self.pacer.is_running() {
            return Ok(None);
        }

        let handle = session.handle();
        let mask = self.input.current_mask();
        let mut sink = HostSink {
            surface,
            scheduler: &mut self.scheduler,
            logger: &mut self.logger,
        };
        let result = self
            .pacer
            .tick(timestamp, session.core_mut(), handle, mask, &mut sink);

        match result {
            Ok(report) => {
                if report.hit_step_limit {
                    self.logger.warn(format!(
                        "Core did not reach cycle {} within {} step calls",
                        report.target, report.step_calls
                    ));
                }
                self.logger.trace(format!(
                    "Tick: {} cycles, {} frames, {} audio chunks",
                    report.cycles, report.frames, report.audio_chunks
                ));
                Ok(Some(report))
            }
            Err(e) => {
                self.logger.error(format!("Fatal core error: {}", e));
                self.shutdown();
                Err(HostError::Core(e))
            }
        }
    }

    /// Timer callback for auto-save and capture
    ///
    /// Also collects the results of finished storage writes.
    pub fn poll_timers(&mut self, now: Duration) -> PollReport {
        for report in self.storage.drain_reports() {
            match report.result {
                Ok(()) => self.logger.debug(format!("Stored {}", report.description)),
                Err(e) => self
                    .logger
                    .warn(format!("Storage write failed ({}): {}", report.description, e)),
            }
        }

        let Phase::Ready(session) = &mut self.phase else {
            return PollReport::default();
        };
        if !self.pacer.is_running() {
            return PollReport::default();
        }
        let handle = session.handle();
        self.persistence.poll(
            now,
            session.core_mut(),
            handle,
            self.console.screen_size(),
            self.storage.as_mut(),
            &mut self.logger,
        )
    }

    /// Stop the session
    ///
    /// Safe at any time and idempotent. Afterwards no pacing step, timer
    /// or core call happens. A core still loading is released by the
    /// loader when it finishes.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.epoch.advance();

        self.listening = false;
        self.start_requested = false;
        self.input.reset();
        self.pacer.shutdown();
        self.persistence.cancel();
        if let Err(e) = self.scheduler.output_mut().suspend() {
            self.logger.warn(format!("Failed to suspend audio: {}", e));
        }

        match std::mem::replace(&mut self.phase, Phase::Stopped) {
            Phase::Ready(session) => {
                let handle = session.handle();
                match session.release() {
                    Ok(()) => self
                        .logger
                        .info(format!("Released core session {}", handle.0)),
                    Err(e) => self
                        .logger
                        .warn(format!("Failed to release core session {}: {}", handle.0, e)),
                }
            }
            Phase::Loading(_) => self.logger.info(
                "Session superseded while the core was loading; the pending session will be released",
            ),
            Phase::Failed(_) | Phase::Stopped => {}
        }
        self.logger.info("Shutdown complete");
    }

    /// Wait for the loader thread to finish
    pub fn join_loader(&mut self) {
        if let Some(handle) = self.loader_thread.take() {
            if handle.join().is_err() {
                self.logger.error("Core loader thread panicked");
            }
        }
    }

    pub fn state(&self) -> HostState {
        match &self.phase {
            Phase::Loading(_) => HostState::Loading,
            Phase::Ready(_) if self.pacer.is_running() => HostState::Running,
            Phase::Ready(_) => HostState::Ready,
            Phase::Failed(_) => HostState::Failed,
            Phase::Stopped => HostState::Stopped,
        }
    }

    /// Failure that ended loading, if any
    pub fn failure(&self) -> Option<&HostError> {
        match &self.phase {
            Phase::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == HostState::Running
    }

    pub fn console(&self) -> Console {
        self.console
    }

    pub fn rom_info(&self) -> &RomInfo {
        &self.rom_info
    }

    /// Handle of the live session
    pub fn handle(&self) -> Option<CoreHandle> {
        match &self.phase {
            Phase::Ready(session) => Some(session.handle()),
            _ => None,
        }
    }

    pub fn pacer(&self) -> &ClockPacer {
        &self.pacer
    }

    pub fn audio_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    pub fn input(&self) -> &InputAggregator {
        &self.input
    }

    pub fn persistence(&self) -> &PersistenceBridge {
        &self.persistence
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn logger_mut(&mut self) -> &mut Logger {
        &mut self.logger
    }
}

impl Drop for EmulatorHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}
