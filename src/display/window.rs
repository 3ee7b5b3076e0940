// Window module - Hosts an emulator session in a window
//
// A winit application with a pixels surface at the console's native
// resolution. Every redraw pumps controllers, runs one pacing step and
// the persistence timers, then presents the latest frame.

use super::framebuffer::FrameBuffer;
use crate::emulator::{EmulatorHost, HostError};
use crate::input::{ButtonSource, GamepadHub};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

/// Window configuration
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Scale factor (1x, 2x, 3x, 4x, etc.)
    pub scale: u32,
    /// Whether to enable VSync
    pub vsync: bool,
    /// Window title
    pub title: String,
}

impl WindowConfig {
    /// Create a new window configuration with default values
    ///
    /// Default: 3x scale, VSync enabled
    pub fn new() -> Self {
        Self {
            scale: 3,
            vsync: true,
            title: "emu-host".to_string(),
        }
    }

    /// Set the scale factor
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.clamp(1, 8); // Clamp between 1x and 8x
        self
    }

    /// Set VSync enabled or disabled
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Window size in pixels for a native resolution
    pub fn window_size(&self, screen: (u32, u32)) -> (u32, u32) {
        (screen.0 * self.scale, screen.1 * self.scale)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Window driving one `EmulatorHost`
pub struct HostWindow {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    config: WindowConfig,
    host: EmulatorHost,
    gamepads: GamepadHub,
    frame_buffer: FrameBuffer,
    origin: Instant,
    error: Option<Box<dyn std::error::Error>>,
}

impl HostWindow {
    pub fn new(config: WindowConfig, host: EmulatorHost, gamepads: GamepadHub) -> Self {
        let (width, height) = host.console().screen_size();
        Self {
            window: None,
            pixels: None,
            config,
            host,
            gamepads,
            frame_buffer: FrameBuffer::new(width, height),
            origin: Instant::now(),
            error: None,
        }
    }

    pub fn host(&self) -> &EmulatorHost {
        &self.host
    }

    /// Pump controller connection events and sample the primary controller
    fn update_controllers(&mut self) {
        for event in self.gamepads.pump() {
            self.host.apply_gamepad_event(event);
        }
        let gamepad = self
            .host
            .input()
            .primary_controller()
            .and_then(|id| self.gamepads.gamepad(id));
        let source = gamepad.as_ref().map(|g| g as &dyn ButtonSource);
        self.host.poll_controller(source);
    }

    /// Run one pacing step and the timers
    fn step(&mut self) -> Result<(), HostError> {
        let now = self.origin.elapsed();
        self.host.on_frame(now, &mut self.frame_buffer)?;
        self.host.poll_timers(now);
        Ok(())
    }

    /// Render the current frame buffer to the window
    fn render(&mut self) -> Result<(), pixels::Error> {
        if let Some(pixels) = &mut self.pixels {
            pixels.frame_mut().copy_from_slice(self.frame_buffer.as_slice());
            pixels.render()?;
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: Box<dyn std::error::Error>) {
        eprintln!("{}", error);
        self.host.shutdown();
        self.error = Some(error);
        event_loop.exit();
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let screen = self.host.console().screen_size();
        let (width, height) = self.config.window_size(screen);

        let window_attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(LogicalSize::new(width, height))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let window_size = window.inner_size();

        // Create surface texture using Arc<Window> for safe 'static lifetime
        let surface_texture =
            SurfaceTexture::new(window_size.width, window_size.height, window.clone());
        let pixels = Pixels::new(screen.0, screen.1, surface_texture)?;

        self.window = Some(window);
        self.pixels = Some(pixels);
        Ok(())
    }
}

impl ApplicationHandler for HostWindow {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.create_surface(event_loop) {
            self.fail(event_loop, format!("Failed to create window: {}", e).into());
            return;
        }
        if let Err(e) = self.host.start() {
            self.fail(event_loop, Box::new(e));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                println!("Close requested, exiting...");
                self.host.shutdown();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed => {
                    self.host.on_key_down(code);
                }
                ElementState::Released => {
                    self.host.on_key_up(code);
                }
            },
            WindowEvent::RedrawRequested => {
                self.update_controllers();
                if let Err(e) = self.step() {
                    self.fail(event_loop, Box::new(e));
                    return;
                }
                if let Err(err) = self.render() {
                    self.fail(event_loop, format!("Render error: {}", err).into());
                    return;
                }

                // Request next frame
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

/// Run a session in a window until it is closed
///
/// # Arguments
/// * `config` - Window configuration
/// * `host` - A constructed session; it is started once the window exists
/// * `gamepads` - Controller event source
///
/// # Returns
/// The error that ended the session, if any
pub fn run_host_window(
    config: WindowConfig,
    host: EmulatorHost,
    gamepads: GamepadHub,
) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;

    // Set control flow based on VSync setting
    if config.vsync {
        event_loop.set_control_flow(ControlFlow::Wait);
    } else {
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    let screen = host.console().screen_size();
    let (width, height) = config.window_size(screen);
    println!("Starting {} session...", host.console());
    println!("  Resolution: {}x{}", screen.0, screen.1);
    println!("  Window size: {}x{}", width, height);
    println!("  Scale: {}x", config.scale);
    println!("  VSync: {}", config.vsync);

    let mut app = HostWindow::new(config, host, gamepads);
    event_loop.run_app(&mut app)?;

    app.host.shutdown();
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
