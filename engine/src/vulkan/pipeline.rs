use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, Handle, HasBuilder};
use vulkanalia::Device;

use super::shader::ShaderLoader;
use crate::error::SampleError;

/// Fixed-function state of one graphics pipeline.
///
/// Vertices are generated in the vertex shader, so there is no vertex input.
#[derive(Clone, Debug)]
pub struct PipelineDesc<'a> {
    pub vertex_shader: &'a str,
    pub fragment_shader: &'a str,
    /// One entry per color attachment of `subpass`.
    pub blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    /// Initial per-attachment write enables, chained through
    /// `VK_EXT_color_write_enable` when present.
    pub color_write_enables: Option<Vec<bool>>,
    pub dynamic_states: Vec<vk::DynamicState>,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub render_pass: vk::RenderPass,
    pub subpass: u32,
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
}

impl<'a> PipelineDesc<'a> {
    /// Triangle list, back faces culled, viewport and scissor dynamic.
    pub fn new(
        vertex_shader: &'a str,
        fragment_shader: &'a str,
        render_pass: vk::RenderPass,
        subpass: u32,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            blend_attachments: vec![opaque_blend_attachment()],
            color_write_enables: None,
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::CLOCKWISE,
            render_pass,
            subpass,
            set_layouts: Vec::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct VulkanPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl VulkanPipeline {
    pub unsafe fn create(
        device: &Device,
        shaders: &ShaderLoader,
        desc: &PipelineDesc,
    ) -> Result<VulkanPipeline> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(&desc.set_layouts);
        let layout = device
            .create_pipeline_layout(&layout_info, None)
            .map_err(SampleError::driver("create pipeline layout"))?;

        match VulkanPipeline::create_pipeline(device, shaders, desc, layout) {
            Ok(pipeline) => {
                debug!(
                    "Created pipeline {} + {} for subpass {}.",
                    desc.vertex_shader, desc.fragment_shader, desc.subpass
                );
                Ok(VulkanPipeline { pipeline, layout })
            }
            Err(error) => {
                device.destroy_pipeline_layout(layout, None);
                Err(error)
            }
        }
    }

    unsafe fn create_pipeline(
        device: &Device,
        shaders: &ShaderLoader,
        desc: &PipelineDesc,
        layout: vk::PipelineLayout,
    ) -> Result<vk::Pipeline> {
        let vertex_shader_module = shaders.load(device, desc.vertex_shader)?;
        let fragment_shader_module = match shaders.load(device, desc.fragment_shader) {
            Ok(module) => module,
            Err(error) => {
                device.destroy_shader_module(vertex_shader_module, None);
                return Err(error);
            }
        };

        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader_module)
            .name(b"main\0");

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader_module)
            .name(b"main\0");

        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Ignored when dynamic, only the counts matter.
        let viewports = &[vk::Viewport::builder().max_depth(1.0)];
        let scissors = &[vk::Rect2D::default()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        // rasterizer
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .depth_bias_enable(false);

        // multisampling
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        // color blending
        let write_enables = desc
            .color_write_enables
            .as_deref()
            .map(color_write_flags)
            .unwrap_or_default();
        let mut color_write_info =
            vk::PipelineColorWriteCreateInfoEXT::builder().color_write_enables(&write_enables);

        let mut color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&desc.blend_attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        if desc.color_write_enables.is_some() {
            color_blend_state = color_blend_state.push_next(&mut color_write_info);
        }

        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&desc.dynamic_states);

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(desc.render_pass)
            .subpass(desc.subpass);

        let result = device.create_graphics_pipelines(vk::PipelineCache::null(), &[info], None);

        // destroy shader modules
        device.destroy_shader_module(vertex_shader_module, None);
        device.destroy_shader_module(fragment_shader_module, None);

        Ok(result.map_err(SampleError::driver("create graphics pipeline"))?.0[0])
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        if !self.pipeline.is_null() {
            device.destroy_pipeline(self.pipeline, None);
        }
        if !self.layout.is_null() {
            device.destroy_pipeline_layout(self.layout, None);
        }
        *self = VulkanPipeline::default();
    }
}

/// Writes every channel, no blending.
pub fn opaque_blend_attachment() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::all())
        .blend_enable(false)
        .build()
}

/// One attachment per color channel, each writing only its channel and alpha.
pub fn channel_blend_attachments() -> [vk::PipelineColorBlendAttachmentState; 3] {
    [
        vk::ColorComponentFlags::R,
        vk::ColorComponentFlags::G,
        vk::ColorComponentFlags::B,
    ]
    .map(|channel| {
        vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(channel | vk::ColorComponentFlags::A)
            .blend_enable(false)
            .build()
    })
}

pub fn color_write_flags(enables: &[bool]) -> Vec<vk::Bool32> {
    enables
        .iter()
        .map(|enabled| if *enabled { vk::TRUE } else { vk::FALSE })
        .collect()
}
