use super::{
    context::VulkanContext,
    device::{QueueFamilyIndices, VulkanDevice},
    instance::VulkanInstance,
};
use anyhow::Result;
use vulkanalia::vk::{self, DeviceV1_0, ExtColorWriteEnableExtension, Handle, HasBuilder};
use vulkanalia::Device;

use super::pipeline::color_write_flags;
use crate::error::SampleError;
use crate::ui::UiOverlay;

#[derive(Debug)]
pub struct VulkanCommandBuffer;

impl VulkanCommandBuffer {
    pub unsafe fn create_command_pool(
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;

        // Buffers are re-recorded individually on every settings change.
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(indices.graphics);

        context.command_pool = device
            .vk_device
            .create_command_pool(&info, None)
            .map_err(SampleError::driver("create command pool"))?;

        Ok(())
    }

    /// Allocates one primary command buffer per swapchain image.
    pub unsafe fn create_command_buffers(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(context.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(context.swapchain_images.len() as u32);

        context.command_buffers = device
            .vk_device
            .allocate_command_buffers(&allocate_info)
            .map_err(SampleError::driver("allocate command buffers"))?;

        Ok(())
    }

    pub unsafe fn free_command_buffers(device: &VulkanDevice, context: &mut VulkanContext) {
        if !context.command_buffers.is_empty() {
            device
                .vk_device
                .free_command_buffers(context.command_pool, &context.command_buffers);
            context.command_buffers.clear();
        }
    }

    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        VulkanCommandBuffer::free_command_buffers(device, context);
        if !context.command_pool.is_null() {
            device
                .vk_device
                .destroy_command_pool(context.command_pool, None);
            context.command_pool = vk::CommandPool::null();
        }
    }
}

/// The commands samples record, in the order they are recorded.
pub trait CommandSink {
    fn begin(&mut self) -> Result<()>;
    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    );
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet);
    /// Full-extent viewport with depth `0..1`.
    fn set_viewport(&mut self, extent: vk::Extent2D);
    fn set_scissor(&mut self, extent: vk::Extent2D);
    /// One flag per color attachment of the current subpass.
    fn set_color_write_enable(&mut self, enables: &[bool]);
    /// Non-indexed, single instance.
    fn draw(&mut self, vertex_count: u32);
    fn next_subpass(&mut self);
    fn draw_ui(&mut self, overlay: &dyn UiOverlay);
    fn end_render_pass(&mut self);
    fn end(&mut self) -> Result<()>;
}

/// [`CommandSink`] recording into a primary command buffer.
pub struct DeviceCommands<'a> {
    device: &'a Device,
    command_buffer: vk::CommandBuffer,
}

impl<'a> DeviceCommands<'a> {
    /// `command_buffer` must come from a pool with resettable buffers and must
    /// not be pending execution.
    pub unsafe fn new(device: &'a Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
        }
    }
}

impl CommandSink for DeviceCommands<'_> {
    fn begin(&mut self) -> Result<()> {
        let info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device
                .begin_command_buffer(self.command_buffer, &info)
                .map_err(SampleError::driver("begin command buffer"))?;
        }
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(extent);

        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &info,
                vk::SubpassContents::INLINE,
            );
        }
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn set_viewport(&mut self, extent: vk::Extent2D) {
        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(extent.width as f32)
            .height(extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);

        unsafe {
            self.device
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
        }
    }

    fn set_scissor(&mut self, extent: vk::Extent2D) {
        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(extent);

        unsafe {
            self.device
                .cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }
    }

    fn set_color_write_enable(&mut self, enables: &[bool]) {
        let flags = color_write_flags(enables);
        unsafe {
            self.device
                .cmd_set_color_write_enable_ext(self.command_buffer, &flags);
        }
    }

    fn draw(&mut self, vertex_count: u32) {
        unsafe {
            self.device
                .cmd_draw(self.command_buffer, vertex_count, 1, 0, 0);
        }
    }

    fn next_subpass(&mut self) {
        unsafe {
            self.device
                .cmd_next_subpass(self.command_buffer, vk::SubpassContents::INLINE);
        }
    }

    fn draw_ui(&mut self, overlay: &dyn UiOverlay) {
        unsafe {
            overlay.draw(self.device, self.command_buffer);
        }
    }

    fn end_render_pass(&mut self) {
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
    }

    fn end(&mut self) -> Result<()> {
        unsafe {
            self.device
                .end_command_buffer(self.command_buffer)
                .map_err(SampleError::driver("end command buffer"))?;
        }
        Ok(())
    }
}

/// Commands captured by [`Recorder`].
#[cfg(test)]
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    Begin,
    BeginRenderPass {
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_colors: Vec<[f32; 4]>,
    },
    BindPipeline(vk::Pipeline),
    BindDescriptorSet(vk::PipelineLayout, vk::DescriptorSet),
    SetViewport(vk::Extent2D),
    SetScissor(vk::Extent2D),
    SetColorWriteEnable(Vec<bool>),
    Draw(u32),
    NextSubpass,
    DrawUi,
    EndRenderPass,
    End,
}

/// Captures commands instead of recording them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct Recorder {
    pub commands: Vec<Recorded>,
}

#[cfg(test)]
impl CommandSink for Recorder {
    fn begin(&mut self) -> Result<()> {
        self.commands.push(Recorded::Begin);
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_values: &[vk::ClearValue],
    ) {
        let clear_colors = clear_values
            .iter()
            .map(|v| unsafe { v.color.float32 })
            .collect();
        self.commands.push(Recorded::BeginRenderPass {
            render_pass,
            framebuffer,
            extent,
            clear_colors,
        });
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.commands.push(Recorded::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, layout: vk::PipelineLayout, set: vk::DescriptorSet) {
        self.commands.push(Recorded::BindDescriptorSet(layout, set));
    }

    fn set_viewport(&mut self, extent: vk::Extent2D) {
        self.commands.push(Recorded::SetViewport(extent));
    }

    fn set_scissor(&mut self, extent: vk::Extent2D) {
        self.commands.push(Recorded::SetScissor(extent));
    }

    fn set_color_write_enable(&mut self, enables: &[bool]) {
        self.commands
            .push(Recorded::SetColorWriteEnable(enables.to_vec()));
    }

    fn draw(&mut self, vertex_count: u32) {
        self.commands.push(Recorded::Draw(vertex_count));
    }

    fn next_subpass(&mut self) {
        self.commands.push(Recorded::NextSubpass);
    }

    fn draw_ui(&mut self, _overlay: &dyn UiOverlay) {
        self.commands.push(Recorded::DrawUi);
    }

    fn end_render_pass(&mut self) {
        self.commands.push(Recorded::EndRenderPass);
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push(Recorded::End);
        Ok(())
    }
}
