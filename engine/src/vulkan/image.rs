use anyhow::{anyhow, Result};
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, Handle, HasBuilder, InstanceV1_0};
use vulkanalia::{Device, Instance};

use crate::error::SampleError;

/// An offscreen attachment owned by a sample.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameBufferAttachment {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
}

impl FrameBufferAttachment {
    pub fn is_null(&self) -> bool {
        self.image.is_null() && self.memory.is_null() && self.view.is_null()
    }

    /// Releases whatever handles were created. Null handles are ignored by
    /// the driver, so a partly built attachment is released too.
    pub unsafe fn destroy(&mut self, device: &Device) {
        if self.is_null() {
            return;
        }
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
        *self = FrameBufferAttachment {
            format: self.format,
            ..Default::default()
        };
    }
}

#[derive(Debug)]
pub struct VulkanImage;

impl VulkanImage {
    /// Allocates a device-local 2D image of `extent`, backs it with memory of the
    /// driver-reported size and creates a color view for it.
    pub unsafe fn create_attachment(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
    ) -> Result<FrameBufferAttachment> {
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = device
            .create_image(&info, None)
            .map_err(SampleError::driver("create attachment image"))?;

        let mut attachment = FrameBufferAttachment {
            image,
            format,
            ..Default::default()
        };
        match VulkanImage::back_attachment(instance, device, physical_device, &mut attachment) {
            Ok(size) => {
                debug!(
                    "Created {:?} attachment {}x{} ({} bytes).",
                    format, extent.width, extent.height, size
                );
                Ok(attachment)
            }
            Err(error) => {
                attachment.destroy(device);
                Err(error)
            }
        }
    }

    /// Allocates, binds and views the memory of `attachment.image`, filling in
    /// each handle as it is created. Returns the allocation size.
    unsafe fn back_attachment(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        attachment: &mut FrameBufferAttachment,
    ) -> Result<vk::DeviceSize> {
        let requirements = device.get_image_memory_requirements(attachment.image);
        let memory_properties = instance.get_physical_device_memory_properties(physical_device);
        let memory_type_index = memory_type_index(
            &memory_properties,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            requirements,
        )?;

        let info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        attachment.memory = device
            .allocate_memory(&info, None)
            .map_err(SampleError::driver("allocate attachment memory"))?;

        device
            .bind_image_memory(attachment.image, attachment.memory, 0)
            .map_err(SampleError::driver("bind attachment memory"))?;

        attachment.view = VulkanImage::create_view(device, attachment.image, attachment.format)?;

        Ok(requirements.size)
    }

    pub unsafe fn create_view(
        device: &Device,
        image: vk::Image,
        format: vk::Format,
    ) -> Result<vk::ImageView> {
        let subresource_range = vk::ImageSubresourceRange::builder()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1);

        let info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::_2D)
            .format(format)
            .subresource_range(subresource_range);

        Ok(device
            .create_image_view(&info, None)
            .map_err(SampleError::driver("create image view"))?)
    }
}

/// Index of the first memory type allowed by `requirements` that has `properties`.
pub fn memory_type_index(
    memory: &vk::PhysicalDeviceMemoryProperties,
    properties: vk::MemoryPropertyFlags,
    requirements: vk::MemoryRequirements,
) -> Result<u32> {
    (0..memory.memory_type_count)
        .find(|i| {
            let suitable = (requirements.memory_type_bits & (1 << i)) != 0;
            let memory_type = memory.memory_types[*i as usize];
            suitable && memory_type.property_flags.contains(properties)
        })
        .ok_or_else(|| anyhow!("Failed to find suitable memory type."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut memory = vk::PhysicalDeviceMemoryProperties::default();
        memory.memory_type_count = flags.len() as u32;
        for (i, f) in flags.iter().enumerate() {
            memory.memory_types[i].property_flags = *f;
        }
        memory
    }

    #[test]
    fn picks_device_local_type_allowed_by_requirements() {
        let memory = memory_with(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        let requirements = vk::MemoryRequirements {
            memory_type_bits: 0b100,
            ..Default::default()
        };

        let index =
            memory_type_index(&memory, vk::MemoryPropertyFlags::DEVICE_LOCAL, requirements).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn no_matching_type_is_an_error() {
        let memory = memory_with(&[vk::MemoryPropertyFlags::HOST_VISIBLE]);
        let requirements = vk::MemoryRequirements {
            memory_type_bits: 0b1,
            ..Default::default()
        };

        assert!(
            memory_type_index(&memory, vk::MemoryPropertyFlags::DEVICE_LOCAL, requirements).is_err()
        );
    }

    #[test]
    fn default_attachment_is_null() {
        assert!(FrameBufferAttachment::default().is_null());
    }

    #[test]
    fn partially_created_attachment_is_not_null() {
        let image_only = FrameBufferAttachment {
            image: vk::Image::from_raw(1),
            ..Default::default()
        };
        assert!(!image_only.is_null());

        let unbound = FrameBufferAttachment {
            memory: vk::DeviceMemory::from_raw(2),
            ..image_only
        };
        assert!(!unbound.is_null());
        assert!(unbound.view.is_null());
    }
}
