use anyhow::{anyhow, Result};
use command_buffer::VulkanCommandBuffer;
use context::VulkanContext;
use device::VulkanDevice;
use instance::VulkanInstance;
use log::*;
use swapchain::VulkanSwapchain;
use vulkanalia::{
    loader::{LibloadingLoader, LIBRARY},
    vk::{self, DeviceV1_0, Handle, HasBuilder, KhrSwapchainExtension},
    Entry,
};
use winit::window::Window;

use crate::config::Config;
use crate::error::SampleError;
use crate::sample::{FrameRenderer, SampleContext};
use crate::ui::{Drawer, NullOverlay, UiOverlay};
use shader::ShaderLoader;

pub mod command_buffer;
mod constants;
mod context;
pub mod descriptor;
mod device;
pub mod framebuffer;
pub mod image;
mod instance;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
mod swapchain;

/// Owns the Vulkan objects shared by every sample and drives one sample
/// through its lifecycle.
pub struct VulkanRenderer {
    _entry: Entry,
    pub instance: VulkanInstance,
    pub device: VulkanDevice,
    context: VulkanContext,
    sample: Box<dyn FrameRenderer>,
    shaders: ShaderLoader,
    overlay: NullOverlay,
    vsync: bool,
    frame: usize,
    /// Set by the window when its size changed.
    pub resized: bool,
    /// The sample declined the last resize and has no valid command buffers.
    resize_pending: bool,
}

impl VulkanRenderer {
    pub unsafe fn new(
        window: &Window,
        config: &Config,
        mut sample: Box<dyn FrameRenderer>,
    ) -> Result<VulkanRenderer> {
        let loader = LibloadingLoader::new(LIBRARY)?;
        let entry = Entry::new(loader).map_err(|b| anyhow!("{}", b))?;

        let requirements = sample.requirements();

        let mut context = VulkanContext::default();
        let instance = VulkanInstance::new(
            window,
            &entry,
            &mut context,
            config.graphics.validation,
            &requirements.instance_extensions,
        )?;
        VulkanSwapchain::new(window, &instance, &mut context)?;
        let device = VulkanDevice::new(&entry, &instance, &mut context, &requirements)?;

        VulkanSwapchain::create(window, &instance, &device, &mut context, config.graphics.vsync)?;
        VulkanSwapchain::create_image_views(&device, &mut context)?;

        VulkanCommandBuffer::create_command_pool(&instance, &device, &mut context)?;
        VulkanCommandBuffer::create_command_buffers(&device, &mut context)?;

        VulkanRenderer::create_sync_objects(&device, &mut context)?;

        let shaders = ShaderLoader::new(&config.assets.shader_dir);
        let overlay = NullOverlay;

        {
            let ctx = sample_context(&instance, &device, &context, &shaders, &overlay);
            sample.prepare(&ctx)?;
            sample.build_command_buffers(&ctx)?;
        }

        info!("Prepared sample `{}`.", sample.name());

        Ok(VulkanRenderer {
            _entry: entry,
            instance,
            device,
            context,
            sample,
            shaders,
            overlay,
            vsync: config.graphics.vsync,
            frame: 0,
            resized: false,
            resize_pending: false,
        })
    }

    pub fn sample_name(&self) -> &'static str {
        self.sample.name()
    }

    unsafe fn create_sync_objects(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        for _ in 0..constants::MAX_FRAMES_IN_FLIGHT {
            context.image_available_semaphores.push(
                device
                    .vk_device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(SampleError::driver("create semaphore"))?,
            );
            context.render_finished_semaphores.push(
                device
                    .vk_device
                    .create_semaphore(&semaphore_info, None)
                    .map_err(SampleError::driver("create semaphore"))?,
            );
            context.in_flight_fences.push(
                device
                    .vk_device
                    .create_fence(&fence_info, None)
                    .map_err(SampleError::driver("create fence"))?,
            );
        }

        context.images_in_flight = context
            .swapchain_images
            .iter()
            .map(|_| vk::Fence::null())
            .collect();

        Ok(())
    }

    /// Submits the prepared command buffer of the next swapchain image.
    pub unsafe fn render(&mut self, window: &Window, delta_time: f32) -> Result<()> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }

        if self.resize_pending {
            self.resize_sample()?;
            if self.resize_pending {
                return Ok(());
            }
        }

        let in_flight_fence = self.context.in_flight_fences[self.frame];
        self.device
            .vk_device
            .wait_for_fences(&[in_flight_fence], true, u64::MAX)
            .map_err(SampleError::driver("wait for fence"))?;

        let result = self.device.vk_device.acquire_next_image_khr(
            self.context.swapchain,
            u64::MAX,
            self.context.image_available_semaphores[self.frame],
            vk::Fence::null(),
        );

        let image_index = match result {
            Ok((image_index, _)) => image_index as usize,
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => return self.recreate_swapchain(window),
            Err(code) => return Err(SampleError::driver("acquire swapchain image")(code).into()),
        };

        let image_in_flight = self.context.images_in_flight[image_index];
        if !image_in_flight.is_null() {
            self.device
                .vk_device
                .wait_for_fences(&[image_in_flight], true, u64::MAX)
                .map_err(SampleError::driver("wait for fence"))?;
        }

        self.context.images_in_flight[image_index] = in_flight_fence;

        {
            let ctx = sample_context(
                &self.instance,
                &self.device,
                &self.context,
                &self.shaders,
                &self.overlay,
            );
            self.sample.render(&ctx, delta_time)?;
        }

        let wait_semaphores = &[self.context.image_available_semaphores[self.frame]];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[self.context.command_buffers[image_index]];
        let signal_semaphores = &[self.context.render_finished_semaphores[self.frame]];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        self.device
            .vk_device
            .reset_fences(&[in_flight_fence])
            .map_err(SampleError::driver("reset fence"))?;

        self.device
            .vk_device
            .queue_submit(self.context.graphics_queue, &[submit_info], in_flight_fence)
            .map_err(SampleError::driver("submit draw commands"))?;

        let swapchains = &[self.context.swapchain];
        let image_indices = &[image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(signal_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = self
            .device
            .vk_device
            .queue_present_khr(self.context.present_queue, &present_info);

        if present_outdated(result)? || self.resized {
            self.resized = false;
            self.recreate_swapchain(window)?;
        }

        self.frame = (self.frame + 1) % constants::MAX_FRAMES_IN_FLIGHT;

        Ok(())
    }

    unsafe fn recreate_swapchain(&mut self, window: &Window) -> Result<()> {
        self.device
            .vk_device
            .device_wait_idle()
            .map_err(SampleError::driver("wait for device idle"))?;

        VulkanCommandBuffer::free_command_buffers(&self.device, &mut self.context);
        VulkanSwapchain::destroy(&self.device, &mut self.context);

        VulkanSwapchain::create(
            window,
            &self.instance,
            &self.device,
            &mut self.context,
            self.vsync,
        )?;
        VulkanSwapchain::create_image_views(&self.device, &mut self.context)?;
        VulkanCommandBuffer::create_command_buffers(&self.device, &mut self.context)?;

        self.context.images_in_flight = self
            .context
            .swapchain_images
            .iter()
            .map(|_| vk::Fence::null())
            .collect();

        self.resize_sample()
    }

    /// Lets the sample rebuild its size dependent resources, then re-records.
    unsafe fn resize_sample(&mut self) -> Result<()> {
        let ctx = sample_context(
            &self.instance,
            &self.device,
            &self.context,
            &self.shaders,
            &self.overlay,
        );

        if self.sample.resize(&ctx)? {
            self.sample.build_command_buffers(&ctx)?;
            self.resize_pending = false;
        } else {
            debug!("Sample `{}` deferred resize.", self.sample.name());
            self.resize_pending = true;
        }

        Ok(())
    }

    /// Runs the sample's settings through `drawer` and re-records every
    /// command buffer when any of them changed.
    pub unsafe fn update_ui_overlay(&mut self, drawer: &mut dyn Drawer) -> Result<()> {
        if self.sample.on_update_ui_overlay(drawer) {
            self.rebuild_command_buffers()?;
        }
        Ok(())
    }

    unsafe fn rebuild_command_buffers(&mut self) -> Result<()> {
        // Re-recording must not overlap a submission of the same buffer.
        self.device
            .vk_device
            .device_wait_idle()
            .map_err(SampleError::driver("wait for device idle"))?;

        if self.resize_pending {
            return Ok(());
        }

        let ctx = sample_context(
            &self.instance,
            &self.device,
            &self.context,
            &self.shaders,
            &self.overlay,
        );
        self.sample.build_command_buffers(&ctx)
    }

    pub unsafe fn destroy(&mut self) {
        if let Err(code) = self.device.vk_device.device_wait_idle() {
            warn!("Failed to wait for device idle before teardown: {}", code);
        }

        self.sample.destroy(&self.device.vk_device);

        self.context
            .in_flight_fences
            .drain(..)
            .for_each(|f| self.device.vk_device.destroy_fence(f, None));
        self.context
            .render_finished_semaphores
            .drain(..)
            .for_each(|s| self.device.vk_device.destroy_semaphore(s, None));
        self.context
            .image_available_semaphores
            .drain(..)
            .for_each(|s| self.device.vk_device.destroy_semaphore(s, None));

        VulkanCommandBuffer::destroy(&self.device, &mut self.context);
        VulkanSwapchain::destroy(&self.device, &mut self.context);
        self.device.destroy();
        self.instance.destroy(&mut self.context);

        info!("Destroyed renderer.");
    }
}

/// Borrowed view of the renderer state, built from individual fields so the
/// sample itself can be borrowed mutably alongside it.
fn sample_context<'a>(
    instance: &'a VulkanInstance,
    device: &'a VulkanDevice,
    context: &'a VulkanContext,
    shaders: &'a ShaderLoader,
    overlay: &'a dyn UiOverlay,
) -> SampleContext<'a> {
    SampleContext {
        instance: &instance.vk_instance,
        device: &device.vk_device,
        physical_device: context.physical_device,
        swapchain_format: context.swapchain_format,
        swapchain_extent: context.swapchain_extent,
        swapchain_image_views: &context.swapchain_image_views,
        command_buffers: &context.command_buffers,
        shaders,
        overlay,
    }
}

/// Whether a present left the swapchain in need of recreation. Any failure
/// other than an out-of-date swapchain is returned as an error.
fn present_outdated(
    result: Result<vk::SuccessCode, vk::ErrorCode>,
) -> Result<bool, SampleError> {
    match result {
        Ok(vk::SuccessCode::SUBOPTIMAL_KHR) | Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(true),
        Ok(_) => Ok(false),
        Err(code) => Err(SampleError::driver("present swapchain image")(code)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_swapchain_requests_recreation() {
        assert!(present_outdated(Ok(vk::SuccessCode::SUBOPTIMAL_KHR)).unwrap());
        assert!(present_outdated(Err(vk::ErrorCode::OUT_OF_DATE_KHR)).unwrap());
        assert!(!present_outdated(Ok(vk::SuccessCode::SUCCESS)).unwrap());
    }

    #[test]
    fn device_loss_is_an_error() {
        let err = present_outdated(Err(vk::ErrorCode::DEVICE_LOST)).unwrap_err();

        match err {
            SampleError::Driver { operation, code } => {
                assert_eq!(operation, "present swapchain image");
                assert_eq!(code, vk::ErrorCode::DEVICE_LOST);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
