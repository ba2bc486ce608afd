use anyhow::Result;
use winit::window::Window;

use crate::config::Config;
use crate::sample::FrameRenderer;
use crate::ui::Drawer;
use crate::vulkan::VulkanRenderer;

pub struct Renderer {
    pub vk_renderer: VulkanRenderer,
}

impl Renderer {
    /// Creates the Vulkan objects and prepares `sample`.
    pub unsafe fn create(
        window: &Window,
        config: &Config,
        sample: Box<dyn FrameRenderer>,
    ) -> Result<Self> {
        let vk_renderer = VulkanRenderer::new(window, config, sample)?;

        Ok(Self { vk_renderer })
    }

    pub fn sample_name(&self) -> &'static str {
        self.vk_renderer.sample_name()
    }

    /// Applies pending settings changes, then renders a frame.
    pub unsafe fn render(
        &mut self,
        window: &Window,
        drawer: &mut dyn Drawer,
        delta_time: f32,
    ) -> Result<()> {
        self.vk_renderer.update_ui_overlay(drawer)?;
        self.vk_renderer.render(window, delta_time)
    }

    /// Marks the swapchain for recreation on the next frame.
    pub fn resized(&mut self) {
        self.vk_renderer.resized = true;
    }

    pub unsafe fn destroy(&mut self) {
        self.vk_renderer.destroy();
    }
}
