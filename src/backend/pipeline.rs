// Graphics pipeline creation
//
// The fixed-function state is captured in `PipelineConfiguration`, a plain
// value that can be inspected and compared without a device. `assemble`
// turns it into a pipeline layout, a color-only render pass and the
// pipeline itself. Shader modules only live inside `assemble`.

use ash::vk;
use std::sync::Arc;

use super::shader::ShaderModule;
use super::LogicalDevice;
use crate::error::{SetupError, SetupResult};

/// How viewport and scissor are supplied. The two are never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportMode {
    /// Baked into the pipeline, covering the whole extent
    Static(vk::Extent2D),
    /// Set at record time through dynamic state
    Dynamic,
}

/// Fixed-function state of the triangle pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfiguration {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,
    pub viewport: ViewportMode,
    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,
    pub depth_bias: bool,
    pub samples: vk::SampleCountFlags,
    pub color_write_mask: vk::ColorComponentFlags,
    pub blend_enable: bool,
    pub dynamic_states: Vec<vk::DynamicState>,
}

impl PipelineConfiguration {
    /// Vertices come from the shader, so there is no vertex input at all.
    pub fn for_extent(extent: vk::Extent2D, dynamic_viewport: bool) -> Self {
        let (viewport, dynamic_states) = if dynamic_viewport {
            (
                ViewportMode::Dynamic,
                vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            )
        } else {
            (ViewportMode::Static(extent), Vec::new())
        };

        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
            viewport,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            depth_bias: false,
            samples: vk::SampleCountFlags::TYPE_1,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            blend_enable: false,
            dynamic_states,
        }
    }

    /// Baked viewport, `None` when it is dynamic
    pub fn static_viewport(&self) -> Option<(vk::Viewport, vk::Rect2D)> {
        match self.viewport {
            ViewportMode::Static(extent) => Some((
                vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: extent.width as f32,
                    height: extent.height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                },
                vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                },
            )),
            ViewportMode::Dynamic => None,
        }
    }
}

/// Pipeline, render pass and layout, destroyed together
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub render_pass: vk::RenderPass,
    pub layout: vk::PipelineLayout,
    pub configuration: PipelineConfiguration,
    device: Arc<LogicalDevice>,
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        log::debug!("Destroying graphics pipeline");
        // Null handles (from a failed assemble) are ignored by Vulkan
        unsafe {
            let device = self.device.raw();
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_render_pass(self.render_pass, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Build the graphics pipeline for `format`/`extent` from SPIR-V binaries.
pub fn assemble(
    device: Arc<LogicalDevice>,
    format: vk::Format,
    extent: vk::Extent2D,
    vertex_spirv: &[u32],
    fragment_spirv: &[u32],
    dynamic_viewport: bool,
) -> SetupResult<GraphicsPipeline> {
    let configuration = PipelineConfiguration::for_extent(extent, dynamic_viewport);

    let mut assembled = GraphicsPipeline {
        pipeline: vk::Pipeline::null(),
        render_pass: vk::RenderPass::null(),
        layout: vk::PipelineLayout::null(),
        configuration,
        device: device.clone(),
    };

    // No descriptor sets, no push constants
    let layout_info = vk::PipelineLayoutCreateInfo::default();
    assembled.layout = unsafe { device.raw().create_pipeline_layout(&layout_info, None) }
        .map_err(SetupError::creation("pipeline layout"))?;

    assembled.render_pass = create_render_pass(&device, format)?;

    // Dropped at the end of this function, right after pipeline creation
    let vertex = ShaderModule::new(&device, vertex_spirv)?;
    let fragment = ShaderModule::new(&device, fragment_spirv)?;

    assembled.pipeline = create_pipeline(
        &device,
        &assembled.configuration,
        assembled.layout,
        assembled.render_pass,
        vertex.handle,
        fragment.handle,
    )?;

    log::info!(
        "Graphics pipeline ready ({}x{}, {} viewport)",
        extent.width,
        extent.height,
        if dynamic_viewport { "dynamic" } else { "static" }
    );

    Ok(assembled)
}

/// Single subpass writing one color attachment that ends up presentable
fn create_render_pass(device: &LogicalDevice, format: vk::Format) -> SetupResult<vk::RenderPass> {
    let color_attachment = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_attachment_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments);

    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.raw().create_render_pass(&render_pass_info, None) }
        .map_err(SetupError::creation("render pass"))
}

fn create_pipeline(
    device: &LogicalDevice,
    configuration: &PipelineConfiguration,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    vertex: vk::ShaderModule,
    fragment: vk::ShaderModule,
) -> SetupResult<vk::Pipeline> {
    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex)
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment)
            .name(c"main"),
    ];

    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(configuration.topology)
        .primitive_restart_enable(configuration.primitive_restart);

    let baked = configuration.static_viewport();
    let viewports: Vec<vk::Viewport> = baked.iter().map(|(viewport, _)| *viewport).collect();
    let scissors: Vec<vk::Rect2D> = baked.iter().map(|(_, scissor)| *scissor).collect();
    let viewport_state = match configuration.viewport {
        ViewportMode::Static(_) => vk::PipelineViewportStateCreateInfo::default()
            .viewports(&viewports)
            .scissors(&scissors),
        ViewportMode::Dynamic => vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1),
    };

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(configuration.polygon_mode)
        .line_width(configuration.line_width)
        .cull_mode(configuration.cull_mode)
        .front_face(configuration.front_face)
        .depth_bias_enable(configuration.depth_bias);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(configuration.samples)
        .min_sample_shading(1.0);

    // Straight overwrite
    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(configuration.color_write_mask)
        .blend_enable(configuration.blend_enable)
        .src_color_blend_factor(vk::BlendFactor::ONE)
        .dst_color_blend_factor(vk::BlendFactor::ZERO)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)];

    let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .logic_op(vk::LogicOp::COPY)
        .attachments(&color_blend_attachments);

    let dynamic_state =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&configuration.dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device
            .raw()
            .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
    }
    .map_err(|(_, result)| SetupError::creation("graphics pipeline")(result))?;

    pipelines.into_iter().next().ok_or(SetupError::ResourceCreation {
        what: "graphics pipeline",
        result: vk::Result::ERROR_UNKNOWN,
    })
}
