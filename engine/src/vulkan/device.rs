use anyhow::{anyhow, Ok, Result};
use log::*;
use std::collections::HashSet;
use thiserror::Error;
use vulkanalia::{
    vk::{self, DeviceV1_0, HasBuilder, InstanceV1_0, InstanceV1_1, KhrSurfaceExtension},
    Device, Entry,
};

use super::{constants, context::VulkanContext, instance::VulkanInstance, swapchain::SwapchainSupport};
use crate::error::SampleError;
use crate::sample::{FeatureRequest, Requirements};

#[derive(Debug)]
pub struct VulkanDevice {
    pub vk_device: Device,
}

#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub String);

impl VulkanDevice {
    unsafe fn pick_physical_device(
        instance: &VulkanInstance,
        context: &mut VulkanContext,
        requirements: &Requirements,
    ) -> Result<()> {
        let mut last_error = None;

        for physical_device in instance.vk_instance.enumerate_physical_devices()? {
            let properties = instance
                .vk_instance
                .get_physical_device_properties(physical_device);

            if let Err(error) =
                VulkanDevice::check_physical_device(instance, context, physical_device, requirements)
            {
                warn!(
                    "Skipping physical device (`{}`): {}",
                    properties.device_name, error
                );
                last_error = Some(error);
            } else {
                info!("Selected physical device (`{}`).", properties.device_name);
                context.physical_device = physical_device;
                return Ok(());
            }
        }

        // Surface the sample specific reason when every device was rejected for it.
        match last_error {
            Some(error) if error.is::<SampleError>() => Err(error),
            _ => Err(anyhow!("Failed to find suitable physical device.")),
        }
    }

    unsafe fn check_physical_device(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
        requirements: &Requirements,
    ) -> Result<()> {
        QueueFamilyIndices::get(instance, context, physical_device)?;
        VulkanDevice::check_extensions(instance, physical_device, requirements)?;

        let support = SwapchainSupport::get(instance, context, physical_device)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(anyhow!(SuitabilityError("swapchain support".to_string())));
        }

        let supported = VulkanDevice::supported_features(instance, physical_device);
        if let Some(feature) = missing_feature(&requirements.features, &supported) {
            return Err(anyhow!(SampleError::MissingFeature(feature)));
        }

        Ok(())
    }

    unsafe fn check_extensions(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
        requirements: &Requirements,
    ) -> Result<()> {
        let available = instance
            .vk_instance
            .enumerate_device_extension_properties(physical_device, None)?
            .iter()
            .map(|e| e.extension_name)
            .collect::<HashSet<_>>();

        if let Some(missing) = constants::DEVICE_EXTENSIONS
            .iter()
            .find(|e| !available.contains(*e))
        {
            return Err(anyhow!(SuitabilityError(format!("device extension {}", missing))));
        }

        if let Some(missing) = requirements
            .device_extensions
            .iter()
            .find(|e| !available.contains(*e))
        {
            return Err(anyhow!(SampleError::MissingExtension(missing.to_string())));
        }

        Ok(())
    }

    unsafe fn supported_features(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> FeatureRequest {
        let mut color_write = vk::PhysicalDeviceColorWriteEnableFeaturesEXT::builder();
        let core = {
            let mut features = vk::PhysicalDeviceFeatures2::builder().push_next(&mut color_write);
            instance
                .vk_instance
                .get_physical_device_features2(physical_device, &mut features);
            features.features
        };

        FeatureRequest {
            independent_blend: core.independent_blend == vk::TRUE,
            sampler_anisotropy: core.sampler_anisotropy == vk::TRUE,
            color_write_enable: color_write.color_write_enable == vk::TRUE,
        }
    }

    pub unsafe fn new(
        entry: &Entry,
        instance: &VulkanInstance,
        context: &mut VulkanContext,
        requirements: &Requirements,
    ) -> Result<VulkanDevice> {
        VulkanDevice::pick_physical_device(instance, context, requirements)?;

        let indices = QueueFamilyIndices::get(instance, context, context.physical_device)?;

        let mut unique_indices = HashSet::new();
        unique_indices.insert(indices.graphics);
        unique_indices.insert(indices.present);

        let queue_priorities = &[1.0];
        let queue_infos = unique_indices
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if instance.validation() {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .chain(requirements.device_extensions.iter())
            .map(|e| e.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos") && entry.version()? >= constants::PORTABILITY_MACOS_VERSION {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        // Optional features are only enabled where the device has them.
        let supported = VulkanDevice::supported_features(instance, context.physical_device);
        let enabled = enabled_features(&requirements.features, &supported);

        let features = vk::PhysicalDeviceFeatures::builder()
            .independent_blend(enabled.independent_blend)
            .sampler_anisotropy(enabled.sampler_anisotropy);

        let mut color_write_features = vk::PhysicalDeviceColorWriteEnableFeaturesEXT::builder()
            .color_write_enable(true);

        let mut info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        if enabled.color_write_enable {
            info = info.push_next(&mut color_write_features);
        }

        let device = instance
            .vk_instance
            .create_device(context.physical_device, &info, None)
            .map_err(SampleError::driver("create device"))?;

        context.graphics_queue = device.get_device_queue(indices.graphics, 0);
        context.present_queue = device.get_device_queue(indices.present, 0);

        debug!("Enabled device features: {:?}", enabled);

        Ok(VulkanDevice { vk_device: device })
    }

    pub unsafe fn destroy(&mut self) {
        self.vk_device.destroy_device(None);
    }
}

/// First requested feature the device lacks. Anisotropy is never required.
pub fn missing_feature(requested: &FeatureRequest, supported: &FeatureRequest) -> Option<&'static str> {
    if requested.independent_blend && !supported.independent_blend {
        Some("independentBlend")
    } else if requested.color_write_enable && !supported.color_write_enable {
        Some("colorWriteEnable")
    } else {
        None
    }
}

pub fn enabled_features(requested: &FeatureRequest, supported: &FeatureRequest) -> FeatureRequest {
    FeatureRequest {
        independent_blend: requested.independent_blend && supported.independent_blend,
        sampler_anisotropy: requested.sampler_anisotropy && supported.sampler_anisotropy,
        color_write_enable: requested.color_write_enable && supported.color_write_enable,
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub unsafe fn get(
        instance: &VulkanInstance,
        context: &VulkanContext,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let properties = instance
            .vk_instance
            .get_physical_device_queue_family_properties(physical_device);

        let graphics = properties
            .iter()
            .position(|p| p.queue_flags.contains(vk::QueueFlags::GRAPHICS))
            .map(|i| i as u32);

        let mut present = None;
        for (index, _) in properties.iter().enumerate() {
            if instance.vk_instance.get_physical_device_surface_support_khr(
                physical_device,
                index as u32,
                context.surface,
            )? {
                present = Some(index as u32);
                break;
            }
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            Ok(Self { graphics, present })
        } else {
            Err(anyhow!(SuitabilityError(
                "required queue families".to_string()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> FeatureRequest {
        FeatureRequest {
            independent_blend: true,
            sampler_anisotropy: true,
            color_write_enable: true,
        }
    }

    #[test]
    fn missing_color_write_enable_is_reported() {
        let supported = FeatureRequest {
            color_write_enable: false,
            ..all()
        };
        assert_eq!(missing_feature(&all(), &supported), Some("colorWriteEnable"));
    }

    #[test]
    fn anisotropy_is_optional() {
        let requested = FeatureRequest {
            sampler_anisotropy: true,
            ..FeatureRequest::default()
        };
        let supported = FeatureRequest::default();

        assert_eq!(missing_feature(&requested, &supported), None);
        assert!(!enabled_features(&requested, &supported).sampler_anisotropy);
    }

    #[test]
    fn unrequested_features_stay_disabled() {
        let enabled = enabled_features(&FeatureRequest::default(), &all());
        assert_eq!(enabled, FeatureRequest::default());
    }
}
