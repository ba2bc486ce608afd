use anyhow::Result;
use vulkanalia::vk::{self, DeviceV1_0, Handle, HasBuilder};
use vulkanalia::Device;

use crate::error::SampleError;

/// One descriptor set of `count` input attachments read by the fragment stage,
/// bound at `0..count` in attachment order.
#[derive(Copy, Clone, Debug, Default)]
pub struct InputAttachmentSet {
    pub layout: vk::DescriptorSetLayout,
    pub pool: vk::DescriptorPool,
    pub set: vk::DescriptorSet,
    pub count: u32,
}

impl InputAttachmentSet {
    pub unsafe fn create(device: &Device, count: u32) -> Result<InputAttachmentSet> {
        let bindings = input_attachment_bindings(count);
        let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = device
            .create_descriptor_set_layout(&info, None)
            .map_err(SampleError::driver("create descriptor set layout"))?;

        let pool_sizes = &[vk::DescriptorPoolSize::builder()
            .type_(vk::DescriptorType::INPUT_ATTACHMENT)
            .descriptor_count(count)];
        let info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(pool_sizes)
            .max_sets(1);
        let pool = device
            .create_descriptor_pool(&info, None)
            .map_err(SampleError::driver("create descriptor pool"))?;

        let layouts = &[layout];
        let info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(layouts);
        let set = device
            .allocate_descriptor_sets(&info)
            .map_err(SampleError::driver("allocate descriptor set"))?[0];

        Ok(InputAttachmentSet {
            layout,
            pool,
            set,
            count,
        })
    }

    /// Points the bindings at `views`. Called again whenever the views are recreated.
    pub unsafe fn write(&self, device: &Device, views: &[vk::ImageView]) {
        debug_assert_eq!(views.len() as u32, self.count);

        let image_infos = views
            .iter()
            .map(|view| {
                [vk::DescriptorImageInfo::builder()
                    .image_view(*view)
                    .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                    .sampler(vk::Sampler::null())]
            })
            .collect::<Vec<_>>();

        let writes = image_infos
            .iter()
            .enumerate()
            .map(|(binding, info)| {
                vk::WriteDescriptorSet::builder()
                    .dst_set(self.set)
                    .dst_binding(binding as u32)
                    .dst_array_element(0)
                    .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                    .image_info(info)
            })
            .collect::<Vec<_>>();

        device.update_descriptor_sets(&writes, &[] as &[vk::CopyDescriptorSet]);
    }

    /// Frees the set with its pool.
    pub unsafe fn destroy(&mut self, device: &Device) {
        if !self.pool.is_null() {
            device.destroy_descriptor_pool(self.pool, None);
        }
        if !self.layout.is_null() {
            device.destroy_descriptor_set_layout(self.layout, None);
        }
        *self = InputAttachmentSet::default();
    }
}

pub fn input_attachment_bindings(count: u32) -> Vec<vk::DescriptorSetLayoutBinding> {
    (0..count)
        .map(|binding| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::INPUT_ATTACHMENT)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_follow_attachment_order() {
        let bindings = input_attachment_bindings(3);

        assert_eq!(
            bindings.iter().map(|b| b.binding).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        for binding in &bindings {
            assert_eq!(binding.descriptor_type, vk::DescriptorType::INPUT_ATTACHMENT);
            assert_eq!(binding.descriptor_count, 1);
            assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        }
    }
}
