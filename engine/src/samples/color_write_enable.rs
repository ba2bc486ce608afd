//! `VK_EXT_color_write_enable`.
//!
//! Subpass 0 draws the triangle once into three offscreen attachments, each
//! masked down to a single color channel. Whether each attachment is written
//! at all is dynamic state, so toggling a channel only re-records the command
//! buffers. Subpass 1 reads the three channels back as input attachments and
//! composites them onto the swapchain image.

use anyhow::{anyhow, Result};
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, Handle};
use vulkanalia::Device;

use super::COLOR_WRITE_ENABLE;
use crate::sample::{FeatureRequest, FrameRenderer, Requirements, SampleContext};
use crate::ui::{Drawer, UiOverlay};
use crate::vulkan::command_buffer::{CommandSink, DeviceCommands};
use crate::vulkan::descriptor::InputAttachmentSet;
use crate::vulkan::framebuffer::VulkanFramebuffer;
use crate::vulkan::image::{FrameBufferAttachment, VulkanImage};
use crate::vulkan::pipeline::{channel_blend_attachments, PipelineDesc, VulkanPipeline};
use crate::vulkan::render_pass::{VulkanRenderPass, COLOR_SUBPASS, COMPOSITION_SUBPASS};

const CHANNELS: usize = 3;

/// The channel attachments share the swapchain format.
fn channel_formats(swapchain_format: vk::Format) -> [vk::Format; CHANNELS] {
    [swapchain_format; CHANNELS]
}

/// Draws the triangle into every channel, with per-channel write enables
/// left dynamic.
fn color_pipeline_desc(render_pass: vk::RenderPass) -> PipelineDesc<'static> {
    PipelineDesc {
        blend_attachments: channel_blend_attachments().to_vec(),
        color_write_enables: Some(vec![true; CHANNELS]),
        dynamic_states: vec![
            vk::DynamicState::VIEWPORT,
            vk::DynamicState::SCISSOR,
            vk::DynamicState::COLOR_WRITE_ENABLE_EXT,
        ],
        ..PipelineDesc::new(
            "color_write_enable/triangle_separate_channels.vert",
            "color_write_enable/triangle_separate_channels.frag",
            render_pass,
            COLOR_SUBPASS,
        )
    }
}

/// Full-screen triangle reading the channels as input attachments.
fn composition_pipeline_desc(
    render_pass: vk::RenderPass,
    set_layout: vk::DescriptorSetLayout,
) -> PipelineDesc<'static> {
    PipelineDesc {
        cull_mode: vk::CullModeFlags::NONE,
        set_layouts: vec![set_layout],
        ..PipelineDesc::new(
            "color_write_enable/composition.vert",
            "color_write_enable/composition.frag",
            render_pass,
            COMPOSITION_SUBPASS,
        )
    }
}

/// Settings exposed in the UI overlay.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ColorToggles {
    /// Red, green and blue, each in `0..=1`.
    pub background: [f32; CHANNELS],
    /// Write enables of the red, green and blue attachments.
    pub channels: [bool; CHANNELS],
}

impl Default for ColorToggles {
    fn default() -> Self {
        Self {
            background: [0.0; CHANNELS],
            channels: [true; CHANNELS],
        }
    }
}

impl ColorToggles {
    /// Swapchain image and the three channels all clear to the background.
    pub fn clear_values(&self) -> [vk::ClearValue; CHANNELS + 1] {
        let [r, g, b] = self.background;
        [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [r, g, b, 0.0],
            },
        }; CHANNELS + 1]
    }

    /// Returns `true` when any setting changed.
    pub fn on_update_ui_overlay(&mut self, drawer: &mut dyn Drawer) -> bool {
        let mut changed = false;

        if drawer.header("Background color") {
            for (caption, value) in ["Red", "Green", "Blue"]
                .iter()
                .zip(self.background.iter_mut())
            {
                changed |= drawer.slider_float(caption, value, 0.0, 1.0);
            }
        }

        if drawer.header("Enabled attachment") {
            for (caption, value) in ["Red bit", "Green bit", "Blue bit"]
                .iter()
                .zip(self.channels.iter_mut())
            {
                changed |= drawer.checkbox(caption, value);
            }
        }

        changed
    }
}

#[derive(Debug, Default)]
pub struct ColorWriteEnable {
    toggles: ColorToggles,
    render_pass: vk::RenderPass,
    attachments: [FrameBufferAttachment; CHANNELS],
    descriptors: InputAttachmentSet,
    color_pipeline: VulkanPipeline,
    composition_pipeline: VulkanPipeline,
    framebuffers: VulkanFramebuffer,
}

impl ColorWriteEnable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggles(&self) -> &ColorToggles {
        &self.toggles
    }

    fn attachment_views(&self) -> [vk::ImageView; CHANNELS] {
        self.attachments.map(|a| a.view)
    }

    unsafe fn create_attachments(&mut self, ctx: &SampleContext) -> Result<()> {
        let formats = channel_formats(ctx.swapchain_format);
        for (attachment, format) in self.attachments.iter_mut().zip(formats) {
            *attachment = VulkanImage::create_attachment(
                ctx.instance,
                ctx.device,
                ctx.physical_device,
                format,
                ctx.swapchain_extent,
                vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::INPUT_ATTACHMENT,
            )?;
        }
        Ok(())
    }

    unsafe fn destroy_attachments(&mut self, device: &Device) {
        for attachment in self.attachments.iter_mut() {
            attachment.destroy(device);
        }
    }

    unsafe fn create_pipelines(&mut self, ctx: &SampleContext) -> Result<()> {
        self.color_pipeline = VulkanPipeline::create(
            ctx.device,
            ctx.shaders,
            &color_pipeline_desc(self.render_pass),
        )?;
        self.composition_pipeline = VulkanPipeline::create(
            ctx.device,
            ctx.shaders,
            &composition_pipeline_desc(self.render_pass, self.descriptors.layout),
        )?;
        Ok(())
    }

    fn record_frame<S: CommandSink>(
        &self,
        sink: &mut S,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        overlay: &dyn UiOverlay,
    ) -> Result<()> {
        sink.begin()?;
        sink.begin_render_pass(
            self.render_pass,
            framebuffer,
            extent,
            &self.toggles.clear_values(),
        );

        sink.bind_pipeline(self.color_pipeline.pipeline);
        sink.set_viewport(extent);
        sink.set_scissor(extent);
        sink.set_color_write_enable(&self.toggles.channels);
        sink.draw(3);

        sink.next_subpass();
        sink.bind_pipeline(self.composition_pipeline.pipeline);
        sink.bind_descriptor_set(self.composition_pipeline.layout, self.descriptors.set);
        sink.draw(3);

        sink.draw_ui(overlay);
        sink.end_render_pass();
        sink.end()
    }
}

impl FrameRenderer for ColorWriteEnable {
    fn name(&self) -> &'static str {
        COLOR_WRITE_ENABLE
    }

    fn requirements(&self) -> Requirements {
        Requirements {
            instance_extensions: vec![vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name],
            device_extensions: vec![vk::EXT_COLOR_WRITE_ENABLE_EXTENSION.name],
            features: FeatureRequest {
                independent_blend: true,
                color_write_enable: true,
                ..Default::default()
            },
        }
    }

    unsafe fn prepare(&mut self, ctx: &SampleContext) -> Result<()> {
        self.create_attachments(ctx)?;

        self.render_pass = VulkanRenderPass::create_compositing(
            ctx.device,
            ctx.swapchain_format,
            &channel_formats(ctx.swapchain_format),
        )?;

        self.descriptors = InputAttachmentSet::create(ctx.device, CHANNELS as u32)?;
        self.descriptors.write(ctx.device, &self.attachment_views());

        self.create_pipelines(ctx)?;

        self.framebuffers.recreate(
            ctx.device,
            self.render_pass,
            ctx.swapchain_image_views,
            &self.attachment_views(),
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

        trace!(
            "Recorded {} command buffers with channels {:?}.",
            ctx.command_buffers.len(),
            self.toggles.channels
        );

        Ok(())
    }

    /// The channel attachments follow the swapchain extent.
    unsafe fn resize(&mut self, ctx: &SampleContext) -> Result<bool> {
        if self.render_pass.is_null() {
            return Ok(false);
        }

        self.destroy_attachments(ctx.device);
        self.create_attachments(ctx)?;
        self.descriptors.write(ctx.device, &self.attachment_views());

        self.framebuffers.recreate(
            ctx.device,
            self.render_pass,
            ctx.swapchain_image_views,
            &self.attachment_views(),
            ctx.swapchain_extent,
        )?;

        Ok(true)
    }

    fn on_update_ui_overlay(&mut self, drawer: &mut dyn Drawer) -> bool {
        self.toggles.on_update_ui_overlay(drawer)
    }

    unsafe fn destroy(&mut self, device: &Device) {
        self.framebuffers.destroy(device);
        self.color_pipeline.destroy(device);
        self.composition_pipeline.destroy(device);
        self.descriptors.destroy(device);
        if !self.render_pass.is_null() {
            device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }
        self.destroy_attachments(device);

        debug!("Destroyed sample `{}`.", COLOR_WRITE_ENABLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{KeyboardDrawer, NullOverlay, Step};
    use crate::vulkan::command_buffer::{Recorded, Recorder};
    use crate::vulkan::render_pass::{compositing_attachments, CompositingReferences};

    fn prepared() -> ColorWriteEnable {
        ColorWriteEnable {
            render_pass: vk::RenderPass::from_raw(1),
            color_pipeline: VulkanPipeline {
                pipeline: vk::Pipeline::from_raw(2),
                layout: vk::PipelineLayout::from_raw(3),
            },
            composition_pipeline: VulkanPipeline {
                pipeline: vk::Pipeline::from_raw(4),
                layout: vk::PipelineLayout::from_raw(5),
            },
            descriptors: InputAttachmentSet {
                set: vk::DescriptorSet::from_raw(6),
                ..Default::default()
            },
            ..ColorWriteEnable::new()
        }
    }

    fn extent() -> vk::Extent2D {
        vk::Extent2D {
            width: 1280,
            height: 720,
        }
    }

    fn record(sample: &ColorWriteEnable) -> Vec<Recorded> {
        let mut recorder = Recorder::default();
        sample
            .record_frame(&mut recorder, vk::Framebuffer::from_raw(7), extent(), &NullOverlay)
            .unwrap();
        recorder.commands
    }

    /// Runs one UI frame with `presses` queued.
    fn update(sample: &mut ColorWriteEnable, presses: &[(usize, Step)]) -> bool {
        let mut drawer = KeyboardDrawer::new();
        for (widget, step) in presses {
            drawer.press(*widget, *step);
        }
        drawer.begin_frame();
        let changed = sample.on_update_ui_overlay(&mut drawer);
        drawer.end_frame();
        changed
    }

    #[test]
    fn records_both_subpasses_in_order() {
        assert_eq!(
            record(&prepared()),
            vec![
                Recorded::Begin,
                Recorded::BeginRenderPass {
                    render_pass: vk::RenderPass::from_raw(1),
                    framebuffer: vk::Framebuffer::from_raw(7),
                    extent: extent(),
                    clear_colors: vec![[0.0, 0.0, 0.0, 0.0]; 4],
                },
                Recorded::BindPipeline(vk::Pipeline::from_raw(2)),
                Recorded::SetViewport(extent()),
                Recorded::SetScissor(extent()),
                Recorded::SetColorWriteEnable(vec![true, true, true]),
                Recorded::Draw(3),
                Recorded::NextSubpass,
                Recorded::BindPipeline(vk::Pipeline::from_raw(4)),
                Recorded::BindDescriptorSet(
                    vk::PipelineLayout::from_raw(5),
                    vk::DescriptorSet::from_raw(6)
                ),
                Recorded::Draw(3),
                Recorded::DrawUi,
                Recorded::EndRenderPass,
                Recorded::End,
            ]
        );
    }

    #[test]
    fn disabling_red_only_masks_the_red_attachment() {
        let mut sample = prepared();

        // Widgets: three sliders, then the three checkboxes.
        assert!(update(&mut sample, &[(3, Step::Up)]));
        assert_eq!(sample.toggles().channels, [false, true, true]);

        let commands = record(&sample);
        assert!(commands.contains(&Recorded::SetColorWriteEnable(vec![false, true, true])));
    }

    #[test]
    fn background_is_broadcast_to_every_attachment() {
        let mut sample = prepared();

        assert!(update(&mut sample, &[(1, Step::Up), (1, Step::Up)]));
        assert!((sample.toggles().background[1] - 0.2).abs() < 1e-6);

        let clear_colors = match &record(&sample)[1] {
            Recorded::BeginRenderPass { clear_colors, .. } => clear_colors.clone(),
            other => panic!("unexpected command {:?}", other),
        };
        assert_eq!(clear_colors.len(), 4);
        for color in clear_colors {
            assert_eq!(color[0], 0.0);
            assert!((color[1] - 0.2).abs() < 1e-6);
            assert_eq!(color[2], 0.0);
        }
    }

    #[test]
    fn idle_ui_frame_does_not_request_rerecord() {
        let mut sample = prepared();
        assert!(!update(&mut sample, &[]));
        assert_eq!(*sample.toggles(), ColorToggles::default());
    }

    #[test]
    fn requires_color_write_enable_and_independent_blend() {
        let requirements = ColorWriteEnable::new().requirements();

        assert_eq!(
            requirements.device_extensions,
            vec![vk::EXT_COLOR_WRITE_ENABLE_EXTENSION.name]
        );
        assert_eq!(
            requirements.instance_extensions,
            vec![vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name]
        );
        assert!(requirements.features.color_write_enable);
        assert!(requirements.features.independent_blend);
        assert!(!requirements.features.sampler_anisotropy);
    }

    #[test]
    fn channels_use_the_swapchain_format() {
        let swapchain_format = vk::Format::B8G8R8A8_SRGB;
        let formats = channel_formats(swapchain_format);
        assert_eq!(formats, [swapchain_format; CHANNELS]);

        let attachments = compositing_attachments(swapchain_format, &formats);
        assert_eq!(attachments.len(), CHANNELS + 1);
        assert!(attachments.iter().all(|a| a.format == swapchain_format));
    }

    #[test]
    fn color_pipeline_matches_the_color_subpass() {
        let render_pass = vk::RenderPass::from_raw(1);
        let desc = color_pipeline_desc(render_pass);
        let references = CompositingReferences::new(CHANNELS as u32);

        assert_eq!(desc.render_pass, render_pass);
        assert_eq!(desc.subpass, COLOR_SUBPASS);
        assert_eq!(desc.blend_attachments.len(), references.offscreen.len());
        assert_eq!(desc.color_write_enables, Some(vec![true; CHANNELS]));
        assert!(desc
            .dynamic_states
            .contains(&vk::DynamicState::COLOR_WRITE_ENABLE_EXT));
        assert!(desc.set_layouts.is_empty());
    }

    #[test]
    fn composition_pipeline_reads_the_channel_set() {
        let render_pass = vk::RenderPass::from_raw(1);
        let layout = vk::DescriptorSetLayout::from_raw(8);
        let desc = composition_pipeline_desc(render_pass, layout);
        let references = CompositingReferences::new(CHANNELS as u32);

        assert_eq!(desc.subpass, COMPOSITION_SUBPASS);
        assert_eq!(desc.set_layouts, vec![layout]);
        assert_eq!(desc.blend_attachments.len(), references.swapchain.len());
        assert_eq!(desc.cull_mode, vk::CullModeFlags::NONE);
        assert!(desc.color_write_enables.is_none());
        assert!(!desc
            .dynamic_states
            .contains(&vk::DynamicState::COLOR_WRITE_ENABLE_EXT));
    }
}
