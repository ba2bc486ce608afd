use anyhow::Result;
use log::*;
use vulkanalia::vk::{
    self, DeviceV1_0, Handle, HasBuilder, KhrSurfaceExtension, KhrSwapchainExtension,
};
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::{
    context::VulkanContext,
    device::{QueueFamilyIndices, VulkanDevice},
    image::VulkanImage,
    instance::VulkanInstance,
};
use crate::error::SampleError;

#[derive(Debug)]
pub struct VulkanSwapchain;

impl VulkanSwapchain {
    /// Creates the window surface the swapchain presents to.
    pub unsafe fn new(
        window: &Window,
        instance: &VulkanInstance,
        context: &mut VulkanContext,
    ) -> Result<VulkanSwapchain> {
        context.surface = vk_window::create_surface(&instance.vk_instance, &window, &window)
            .map_err(SampleError::driver("create surface"))?;
        Ok(VulkanSwapchain)
    }

    pub unsafe fn create(
        window: &Window,
        instance: &VulkanInstance,
        device: &VulkanDevice,
        context: &mut VulkanContext,
        vsync: bool,
    ) -> Result<()> {
        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;
        let support = SwapchainSupport::get(instance, context, context.physical_device)?;

        let surface_format = get_swapchain_surface_format(&support.formats);
        let present_mode = get_swapchain_present_mode(&support.present_modes, vsync);
        let size = window.inner_size();
        let extent = get_swapchain_extent(size.width, size.height, &support.capabilities);

        let mut image_count = support.capabilities.min_image_count + 1;
        if support.capabilities.max_image_count != 0
            && image_count > support.capabilities.max_image_count
        {
            image_count = support.capabilities.max_image_count;
        }

        let mut queue_family_indices = vec![];
        let image_sharing_mode = if indices.graphics != indices.present {
            queue_family_indices.push(indices.graphics);
            queue_family_indices.push(indices.present);
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(context.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(image_sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        context.swapchain = device
            .vk_device
            .create_swapchain_khr(&info, None)
            .map_err(SampleError::driver("create swapchain"))?;
        context.swapchain_images = device.vk_device.get_swapchain_images_khr(context.swapchain)?;
        context.swapchain_format = surface_format.format;
        context.swapchain_extent = extent;

        info!(
            "Created swapchain {}x{} with {} images ({:?}, {:?}).",
            extent.width,
            extent.height,
            context.swapchain_images.len(),
            surface_format.format,
            present_mode
        );

        Ok(())
    }

    pub unsafe fn create_image_views(
        device: &VulkanDevice,
        context: &mut VulkanContext,
    ) -> Result<()> {
        context.swapchain_image_views = context
            .swapchain_images
            .iter()
            .map(|i| VulkanImage::create_view(&device.vk_device, *i, context.swapchain_format))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(())
    }

    pub unsafe fn destroy(device: &VulkanDevice, context: &mut VulkanContext) {
        context
            .swapchain_image_views
            .drain(..)
            .for_each(|v| device.vk_device.destroy_image_view(v, None));
        context.swapchain_images.clear();
        device
            .vk_device
            .destroy_swapchain_khr(context.swapchain, None);
        context.swapchain = vk::SwapchainKHR::null();
    }
}

#[derive(Clone, Debug)]
pub(crate) struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        Ok(Self {
            capabilities: instance
                .vk_instance
                .get_physical_device_surface_capabilities_khr(physical_device, context.surface)?,
            formats: instance
                .vk_instance
                .get_physical_device_surface_formats_khr(physical_device, context.surface)?,
            present_modes: instance
                .vk_instance
                .get_physical_device_surface_present_modes_khr(physical_device, context.surface)?,
        })
    }
}

fn get_swapchain_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .cloned()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats[0])
}

fn get_swapchain_present_mode(
    present_modes: &[vk::PresentModeKHR],
    vsync: bool,
) -> vk::PresentModeKHR {
    if !vsync && present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent, falling back to the window size clamped to the surface limits.
fn get_swapchain_extent(
    width: u32,
    height: u32,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D::builder()
            .width(width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ))
            .height(height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capabilities(current: vk::Extent2D) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: current,
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 2048,
            },
            ..Default::default()
        }
    }

    #[test]
    fn fixed_surface_extent_wins() {
        let current = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(get_swapchain_extent(1024, 768, &capabilities(current)), current);
    }

    #[test]
    fn window_size_is_clamped() {
        let undefined = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        let extent = get_swapchain_extent(5000, 0, &capabilities(undefined));
        assert_eq!(extent.width, 4096);
        assert_eq!(extent.height, 1);
    }

    #[test]
    fn mailbox_only_without_vsync() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(get_swapchain_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
        assert_eq!(get_swapchain_present_mode(&modes, false), vk::PresentModeKHR::MAILBOX);
        assert_eq!(
            get_swapchain_present_mode(&[vk::PresentModeKHR::FIFO], false),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn srgb_format_is_preferred() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        assert_eq!(get_swapchain_surface_format(&[unorm, srgb]).format, srgb.format);
        assert_eq!(get_swapchain_surface_format(&[unorm]).format, unorm.format);
    }
}
