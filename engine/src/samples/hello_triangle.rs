use anyhow::{anyhow, Result};
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, Handle};
use vulkanalia::Device;

use super::HELLO_TRIANGLE;
use crate::sample::{FrameRenderer, SampleContext};
use crate::ui::UiOverlay;
use crate::vulkan::command_buffer::{CommandSink, DeviceCommands};
use crate::vulkan::framebuffer::VulkanFramebuffer;
use crate::vulkan::pipeline::{PipelineDesc, VulkanPipeline};
use crate::vulkan::render_pass::VulkanRenderPass;

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// The full color triangle drawn straight to the swapchain image in a single
/// subpass.
#[derive(Debug, Default)]
pub struct HelloTriangle {
    render_pass: vk::RenderPass,
    pipeline: VulkanPipeline,
    framebuffers: VulkanFramebuffer,
}

impl HelloTriangle {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_frame<S: CommandSink>(
        &self,
        sink: &mut S,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        overlay: &dyn UiOverlay,
    ) -> Result<()> {
        let clear_values = &[vk::ClearValue {
            color: vk::ClearColorValue {
                float32: CLEAR_COLOR,
            },
        }];

        sink.begin()?;
        sink.begin_render_pass(self.render_pass, framebuffer, extent, clear_values);
        sink.bind_pipeline(self.pipeline.pipeline);
        sink.set_viewport(extent);
        sink.set_scissor(extent);
        sink.draw(3);
        sink.draw_ui(overlay);
        sink.end_render_pass();
        sink.end()
    }
}

impl FrameRenderer for HelloTriangle {
    fn name(&self) -> &'static str {
        HELLO_TRIANGLE
    }

    unsafe fn prepare(&mut self, ctx: &SampleContext) -> Result<()> {
        self.render_pass = VulkanRenderPass::create_default(ctx.device, ctx.swapchain_format)?;

        let desc = PipelineDesc::new("triangle.vert", "triangle.frag", self.render_pass, 0);
        self.pipeline = VulkanPipeline::create(ctx.device, ctx.shaders, &desc)?;

        self.framebuffers.recreate(
            ctx.device,
            self.render_pass,
            ctx.swapchain_image_views,
            &[],
            ctx.swapchain_extent,
        )
    }

    unsafe fn build_command_buffers(&mut self, ctx: &SampleContext) -> Result<()> {
        for (i, command_buffer) in ctx.command_buffers.iter().enumerate() {
            let framebuffer = *self
                .framebuffers
                .framebuffers
                .get(i)
                .ok_or_else(|| anyhow!("No framebuffer for command buffer {}.", i))?;

            let mut sink = DeviceCommands::new(ctx.device, *command_buffer);
            self.record_frame(&mut sink, framebuffer, ctx.swapchain_extent, ctx.overlay)?;
        }

        trace!("Recorded {} command buffers.", ctx.command_buffers.len());

        Ok(())
    }

    unsafe fn resize(&mut self, ctx: &SampleContext) -> Result<bool> {
        if self.render_pass.is_null() {
            return Ok(false);
        }

        self.framebuffers.recreate(
            ctx.device,
            self.render_pass,
            ctx.swapchain_image_views,
            &[],
            ctx.swapchain_extent,
        )?;

        Ok(true)
    }

    unsafe fn destroy(&mut self, device: &Device) {
        self.framebuffers.destroy(device);
        self.pipeline.destroy(device);
        if !self.render_pass.is_null() {
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }
    }
}
