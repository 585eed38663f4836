//! Platform layer: windowing & event loop.
//!
//! - One fixed-size window; closing it is the only way out.
//! - Redraws are paced by a fixed delay after each frame, not by a clock.
//! - Any startup failure stops the event loop and is returned to the caller.

pub mod keys;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use renderer::{COTTAGE_SCENE, Viewer, WgpuBackend};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::keys::ArrowKeys;

/// Startup configuration. Defaults are the cottage viewer's fixed values.
#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Directory containing `shaders/` and `assets/`.
    pub asset_root: PathBuf,
    /// Delay between the end of one frame and the start of the next.
    pub frame_interval: Duration,
    pub backends: wgpu::Backends,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "A4 - Cottage Camera".to_owned(),
            width: 1200,
            height: 800,
            asset_root: PathBuf::from("."),
            frame_interval: Duration::from_secs(1) / 30,
            backends: wgpu::Backends::all(),
        }
    }
}

struct ViewerApp {
    config: ViewerConfig,
    window: Option<Arc<Window>>,
    viewer: Option<Viewer<WgpuBackend>>,
    keys: ArrowKeys,
    next_frame: Instant,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: ViewerConfig) -> Self {
        Self {
            config,
            window: None,
            viewer: None,
            keys: ArrowKeys::default(),
            next_frame: Instant::now(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(false);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );
        log::info!(
            "Window created: {}x{}",
            window.inner_size().width,
            window.inner_size().height
        );

        let backend = pollster::block_on(WgpuBackend::new(window.clone(), self.config.backends))?;
        let viewer = Viewer::load(backend, &self.config.asset_root, &COTTAGE_SCENE)
            .context("Failed to load scene")?;

        window.request_redraw();
        self.window = Some(window);
        self.viewer = Some(viewer);
        self.next_frame = Instant::now();
        Ok(())
    }

    fn render_frame(&mut self) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };
        match viewer.frame(self.keys.input()) {
            Ok(()) => {}
            Err(e) if e.is_surface_lost() => {
                log::warn!("{e}; reconfiguring surface");
                viewer.backend_mut().recreate_surface();
            }
            Err(e) => log::warn!("Frame skipped: {e}"),
        }
        self.next_frame = Instant::now() + self.config.frame_interval;
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("Startup failed: {e:#}");
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.close();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                log::info!("Resized: {}x{}", new_size.width, new_size.height);
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.backend_mut().resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::Focused(false) => self.keys.release_all(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                self.keys.handle(code, state);
            }
            WindowEvent::RedrawRequested => self.render_frame(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if Instant::now() >= self.next_frame {
            window.request_redraw();
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
    }
}

/// Open the window, load the scene and run until the window is closed.
pub fn run_viewer(config: ViewerConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    log::info!(
        "Asset root: {:?}, frame interval: {:?}",
        config.asset_root,
        config.frame_interval
    );

    let mut app = ViewerApp::new(config);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow::anyhow!("Event loop error: {e:?}"))?;

    if let Some(err) = app.error.take() {
        return Err(err);
    }
    if let Some(viewer) = app.viewer.as_ref() {
        log::info!("Rendered {} frames", viewer.frames_rendered());
    }
    Ok(())
}
