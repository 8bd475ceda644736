// Graphics context - the whole setup sequence
//
// instance -> messenger -> surface -> device selection -> logical device
//          -> presentation chain -> graphics pipeline
//
// Fields are declared in reverse creation order so dropping the context
// releases everything newest-first. A failure at any step drops whatever was
// created before it, in the same order.

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::path::PathBuf;
use std::sync::Arc;

use super::diagnostics::{DebugMessenger, DiagnosticsSink};
use super::negotiate::{self, SurfaceConfiguration};
use super::pipeline::{self, GraphicsPipeline};
use super::probe::{ExtensionsVerified, SurfaceSupport, VulkanProbe};
use super::selector::{self, SelectionPolicy};
use super::{shader, Instance, LogicalDevice, PresentationChain, Surface};
use crate::error::SetupResult;

/// Everything the setup sequence needs besides the window
#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub app_name: String,
    pub policy: SelectionPolicy,
    pub preferred_present_mode: vk::PresentModeKHR,
    pub dynamic_viewport: bool,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

pub struct GraphicsContext {
    pipeline: Option<GraphicsPipeline>,
    chain: Option<PresentationChain>,
    surface: Surface,
    device: Arc<LogicalDevice>,
    _messenger: Option<DebugMessenger>,
    instance: Arc<Instance>,

    extensions: ExtensionsVerified<vk::PhysicalDevice>,
    vertex_spirv: Vec<u32>,
    fragment_spirv: Vec<u32>,
    settings: ContextSettings,
}

impl GraphicsContext {
    pub fn new(
        settings: ContextSettings,
        display: RawDisplayHandle,
        window: RawWindowHandle,
        size: vk::Extent2D,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> SetupResult<Self> {
        log::info!("Initializing Vulkan...");

        // Shader binaries are assets; a missing one fails before any GPU work
        let vertex_spirv = shader::load_spirv(&settings.vertex_shader)?;
        let fragment_spirv = shader::load_spirv(&settings.fragment_shader)?;

        let instance = Instance::new(&settings.app_name, display, sink)?;
        let messenger = if instance.diagnostics_enabled() {
            Some(DebugMessenger::new(instance.clone())?)
        } else {
            None
        };
        let surface = Surface::new(instance.clone(), display, window)?;

        let selected = {
            let probe = VulkanProbe::new(&instance, &surface);
            selector::select(&probe, &settings.policy)?
        };
        let device = LogicalDevice::new(
            instance.clone(),
            &selected,
            &settings.policy.required_extensions,
        )?;

        let mut context = Self {
            pipeline: None,
            chain: None,
            surface,
            device,
            _messenger: messenger,
            instance,
            extensions: selected.extensions,
            vertex_spirv,
            fragment_spirv,
            settings,
        };
        context.build_presentation(&selected.support, size)?;

        log::info!("Vulkan initialized successfully!");
        Ok(context)
    }

    /// Rebuild chain and pipeline for a new window size.
    ///
    /// Nothing is kept from the old chain. A zero-sized window just drops
    /// the chain until the next non-zero resize.
    pub fn resize(&mut self, size: vk::Extent2D) -> SetupResult<()> {
        self.device.wait_idle()?;

        // Only one swapchain may exist per surface
        self.pipeline = None;
        self.chain = None;

        if size.width == 0 || size.height == 0 {
            log::debug!("Window minimized, presentation chain released");
            return Ok(());
        }

        let support = {
            let probe = VulkanProbe::new(&self.instance, &self.surface);
            SurfaceSupport::query(&probe, &self.extensions)?
        };
        self.build_presentation(&support, size)
    }

    fn build_presentation(&mut self, support: &SurfaceSupport, size: vk::Extent2D) -> SetupResult<()> {
        let config =
            negotiate::negotiate(support, size, self.settings.preferred_present_mode)?;

        let chain = PresentationChain::build(self.device.clone(), &self.surface, config)?;
        let pipeline = pipeline::assemble(
            self.device.clone(),
            chain.format(),
            chain.extent(),
            &self.vertex_spirv,
            &self.fragment_spirv,
            self.settings.dynamic_viewport,
        )?;

        self.chain = Some(chain);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    pub fn surface_configuration(&self) -> Option<&SurfaceConfiguration> {
        self.chain.as_ref().map(|chain| &chain.config)
    }

    pub fn chain(&self) -> Option<&PresentationChain> {
        self.chain.as_ref()
    }

    pub fn pipeline(&self) -> Option<&GraphicsPipeline> {
        self.pipeline.as_ref()
    }
}

impl Drop for GraphicsContext {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");
        let _ = self.device.wait_idle();
        // Remaining fields drop in declaration order
        self.pipeline = None;
        self.chain = None;
    }
}
