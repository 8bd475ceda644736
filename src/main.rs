// =============================================================================
// VULKAN SURFACE NEGOTIATION - window to configured pipeline
// =============================================================================
//
// SETUP FLOW:
// 1. Initialize logging, load config.toml
// 2. Create the window
// 3. Instance + optional validation messenger
// 4. Surface, physical device selection, logical device
// 5. Swapchain + image views, graphics pipeline
//
// Resizing rebuilds step 5 wholesale. Closing the window tears everything
// down newest-first.
//
// =============================================================================

use anyhow::{Context, Result};
use ash::vk;
use clap::Parser;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use surface_negotiator::backend::diagnostics;
use surface_negotiator::backend::{ContextSettings, GraphicsContext};
use surface_negotiator::config::Config;
use surface_negotiator::logging;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes},
};

#[derive(Debug, Parser)]
#[command(about = "Negotiate a Vulkan device, swapchain and pipeline for a window")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Disable validation layers regardless of the config file
    #[arg(long)]
    no_validation: bool,
}

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let log_output = logging::init();

    let mut config = Config::load(&args.config);
    if args.no_validation {
        config.debug.validation_layers = false;
    }

    if config.debug.log_to_file {
        if let Err(e) = log_output.attach_file(Path::new(&config.debug.log_file)) {
            log::warn!("Could not open log file {:?}: {}", config.debug.log_file, e);
        }
    }

    log::info!("Starting Vulkan setup");
    log::info!(
        "Window: {}x{}, preferred present mode: {}",
        config.window.width,
        config.window.height,
        config.graphics.present_mode
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

struct App {
    config: Config,
    // Dropped before the window it presents to
    context: Option<GraphicsContext>,
    window: Option<Arc<Window>>,
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            window: None,
            failure: None,
        }
    }

    fn settings(&self) -> Result<ContextSettings> {
        Ok(ContextSettings {
            app_name: self.config.window.title.clone(),
            policy: self.config.selection_policy()?,
            preferred_present_mode: self.config.get_present_mode(),
            dynamic_viewport: self.config.graphics.dynamic_viewport,
            vertex_shader: self.config.shaders.vertex.clone(),
            fragment_shader: self.config.shaders.fragment.clone(),
        })
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let settings = self.settings()?;
        let sink = diagnostics::sink_for(self.config.validation_layer_names()?);

        let display = window
            .display_handle()
            .context("Failed to get display handle")?
            .as_raw();
        let handle = window
            .window_handle()
            .context("Failed to get window handle")?
            .as_raw();

        let size = window.inner_size();
        let extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };

        let context = GraphicsContext::new(settings, display, handle, extent, sink)
            .context("Vulkan setup failed")?;

        if let Some(surface) = context.surface_configuration() {
            log::info!(
                "Ready: {} with {:?} at {}x{}",
                context.device().name,
                surface.present_mode,
                surface.extent.width,
                surface.extent.height
            );
        }
        let device = context.device();
        log::debug!(
            "Queues: graphics {:?} (family {}), present {:?} (family {})",
            device.graphics_queue,
            device.queue_families.graphics,
            device.present_queue,
            device.queue_families.present
        );

        self.context = Some(context);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{:#}", error);
        self.failure = Some(error);
        self.context = None;
        event_loop.exit();
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_resizable(self.config.window.resizable)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                self.fail(event_loop, anyhow::Error::new(e).context("Failed to create window"));
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            self.fail(event_loop, e);
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.context = None;
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                log::debug!("Window resized to {}x{}", size.width, size.height);

                let Some(context) = self.context.as_mut() else {
                    return;
                };
                let extent = vk::Extent2D {
                    width: size.width,
                    height: size.height,
                };
                if let Err(e) = context.resize(extent) {
                    self.fail(event_loop, anyhow::Error::new(e).context("Rebuilding swapchain failed"));
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.context = None;
                    event_loop.exit();
                }
            }

            _ => {}
        }
    }
}
