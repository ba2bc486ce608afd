use anyhow::Result;
use vulkanalia::{vk, Device, Instance};

use crate::ui::{Drawer, UiOverlay};
use crate::vulkan::shader::ShaderLoader;

/// Extensions and device features a sample opts into.
///
/// Checked once while selecting the physical device, a device missing any of
/// them is skipped.
#[derive(Clone, Debug, Default)]
pub struct Requirements {
    pub instance_extensions: Vec<vk::ExtensionName>,
    pub device_extensions: Vec<vk::ExtensionName>,
    pub features: FeatureRequest,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FeatureRequest {
    pub independent_blend: bool,
    /// Enabled when available, never required.
    pub sampler_anisotropy: bool,
    /// `VK_EXT_color_write_enable`.
    pub color_write_enable: bool,
}

/// Framework state handed to every sample hook.
pub struct SampleContext<'a> {
    pub instance: &'a Instance,
    pub device: &'a Device,
    pub physical_device: vk::PhysicalDevice,
    pub swapchain_format: vk::Format,
    pub swapchain_extent: vk::Extent2D,
    pub swapchain_image_views: &'a [vk::ImageView],
    /// One primary command buffer per swapchain image.
    pub command_buffers: &'a [vk::CommandBuffer],
    pub shaders: &'a ShaderLoader,
    pub overlay: &'a dyn UiOverlay,
}

/// A sample driven by the framework loop.
///
/// The framework calls `prepare` once, then `build_command_buffers`; after
/// that `render` runs once per frame. Any change reported by
/// `on_update_ui_overlay` and every successful `resize` is followed by a full
/// `build_command_buffers`, never while the buffers are in flight.
pub trait FrameRenderer {
    fn name(&self) -> &'static str;

    fn requirements(&self) -> Requirements {
        Requirements::default()
    }

    /// One-time setup of render passes, attachments, pipelines and descriptors.
    unsafe fn prepare(&mut self, ctx: &SampleContext) -> Result<()>;

    /// Records every buffer of `ctx.command_buffers` from scratch.
    unsafe fn build_command_buffers(&mut self, ctx: &SampleContext) -> Result<()>;

    /// Per-frame hook, runs before the prepared command buffer is submitted.
    unsafe fn render(&mut self, ctx: &SampleContext, delta_time: f32) -> Result<()> {
        let _ = (ctx, delta_time);
        Ok(())
    }

    /// Recreates size dependent resources after the swapchain changed.
    /// Returns `false` when the sample cannot resize yet, the framework retries
    /// on the next frame.
    unsafe fn resize(&mut self, ctx: &SampleContext) -> Result<bool>;

    /// Returns `true` when a setting changed and the command buffers are stale.
    fn on_update_ui_overlay(&mut self, drawer: &mut dyn Drawer) -> bool {
        let _ = drawer;
        false
    }

    unsafe fn destroy(&mut self, device: &Device);
}
