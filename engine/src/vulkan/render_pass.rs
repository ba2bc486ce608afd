use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};
use vulkanalia::Device;

use crate::error::SampleError;

/// Subpass writing the offscreen channel attachments.
pub const COLOR_SUBPASS: u32 = 0;
/// Subpass reading the channels back as input attachments and writing the swapchain image.
pub const COMPOSITION_SUBPASS: u32 = 1;

/// Attachment index of the swapchain image in every render pass built here.
pub const SWAPCHAIN_ATTACHMENT: u32 = 0;

#[derive(Debug)]
pub struct VulkanRenderPass;

impl VulkanRenderPass {
    /// Single subpass clearing and presenting the swapchain image.
    pub unsafe fn create_default(device: &Device, swapchain_format: vk::Format) -> Result<vk::RenderPass> {
        let attachments = &[swapchain_attachment(swapchain_format)];

        let color_attachments = &[vk::AttachmentReference::builder()
            .attachment(SWAPCHAIN_ATTACHMENT)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let subpasses = &[vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(color_attachments)];

        let dependencies = &[vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)];

        let info = vk::RenderPassCreateInfo::builder()
            .attachments(attachments)
            .subpasses(subpasses)
            .dependencies(dependencies);

        let render_pass = device
            .create_render_pass(&info, None)
            .map_err(SampleError::driver("create render pass"))?;

        debug!("Created single subpass render pass.");

        Ok(render_pass)
    }

    /// Two subpass pass: the swapchain image followed by one attachment per
    /// entry of `offscreen_formats`.
    pub unsafe fn create_compositing(
        device: &Device,
        swapchain_format: vk::Format,
        offscreen_formats: &[vk::Format],
    ) -> Result<vk::RenderPass> {
        let attachments = compositing_attachments(swapchain_format, offscreen_formats);
        let references = CompositingReferences::new(offscreen_formats.len() as u32);

        let subpasses = &[
            vk::SubpassDescription::builder()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&references.offscreen),
            vk::SubpassDescription::builder()
                .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                .color_attachments(&references.swapchain)
                .input_attachments(&references.inputs),
        ];

        let dependencies = compositing_dependencies();

        let info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(subpasses)
            .dependencies(&dependencies);

        let render_pass = device
            .create_render_pass(&info, None)
            .map_err(SampleError::driver("create render pass"))?;

        debug!(
            "Created compositing render pass ({} attachments, {} subpasses).",
            attachments.len(),
            subpasses.len()
        );

        Ok(render_pass)
    }
}

fn swapchain_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build()
}

/// Swapchain attachment first, then the offscreen channels. The channels are
/// stored so they stay inspectable after the pass.
pub fn compositing_attachments(
    swapchain_format: vk::Format,
    offscreen_formats: &[vk::Format],
) -> Vec<vk::AttachmentDescription> {
    let offscreen = offscreen_formats.iter().map(|format| {
        vk::AttachmentDescription::builder()
            .format(*format)
            .samples(vk::SampleCountFlags::_1)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .build()
    });

    std::iter::once(swapchain_attachment(swapchain_format))
        .chain(offscreen)
        .collect()
}

/// Attachment references of the two compositing subpasses.
#[derive(Clone, Debug)]
pub struct CompositingReferences {
    /// Color outputs of the color subpass.
    pub offscreen: Vec<vk::AttachmentReference>,
    /// Color output of the composition subpass.
    pub swapchain: Vec<vk::AttachmentReference>,
    /// Inputs of the composition subpass, same attachments as `offscreen`.
    pub inputs: Vec<vk::AttachmentReference>,
}

impl CompositingReferences {
    pub fn new(offscreen_count: u32) -> Self {
        let reference = |attachment, layout| {
            vk::AttachmentReference::builder()
                .attachment(attachment)
                .layout(layout)
                .build()
        };

        let channels = SWAPCHAIN_ATTACHMENT + 1..=offscreen_count;
        Self {
            offscreen: channels
                .clone()
                .map(|i| reference(i, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL))
                .collect(),
            swapchain: vec![reference(
                SWAPCHAIN_ATTACHMENT,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            )],
            inputs: channels
                .map(|i| reference(i, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL))
                .collect(),
        }
    }
}

/// External to color, color to composition, composition to external.
pub fn compositing_dependencies() -> [vk::SubpassDependency; 3] {
    [
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(COLOR_SUBPASS)
            .src_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::MEMORY_READ)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
            .dependency_flags(vk::DependencyFlags::BY_REGION)
            .build(),
        vk::SubpassDependency::builder()
            .src_subpass(COLOR_SUBPASS)
            .dst_subpass(COMPOSITION_SUBPASS)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::FRAGMENT_SHADER)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::INPUT_ATTACHMENT_READ)
            .dependency_flags(vk::DependencyFlags::BY_REGION)
            .build(),
        vk::SubpassDependency::builder()
            .src_subpass(COMPOSITION_SUBPASS)
            .dst_subpass(vk::SUBPASS_EXTERNAL)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::BOTTOM_OF_PIPE)
            .src_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            )
            .dst_access_mask(vk::AccessFlags::MEMORY_READ)
            .dependency_flags(vk::DependencyFlags::BY_REGION)
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSCREEN: [vk::Format; 3] = [vk::Format::R8G8B8A8_UNORM; 3];

    #[test]
    fn swapchain_attachment_comes_first_and_presents() {
        let attachments = compositing_attachments(vk::Format::B8G8R8A8_SRGB, &OFFSCREEN);

        assert_eq!(attachments.len(), 4);
        assert_eq!(attachments[0].format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachments[0].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        for attachment in &attachments[1..] {
            assert_eq!(attachment.format, vk::Format::R8G8B8A8_UNORM);
            assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
            assert_eq!(attachment.final_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        }
    }

    #[test]
    fn composition_reads_what_color_subpass_writes() {
        let references = CompositingReferences::new(3);

        let written = references.offscreen.iter().map(|r| r.attachment).collect::<Vec<_>>();
        let read = references.inputs.iter().map(|r| r.attachment).collect::<Vec<_>>();
        assert_eq!(written, vec![1, 2, 3]);
        assert_eq!(read, written);
        assert!(references
            .inputs
            .iter()
            .all(|r| r.layout == vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));

        assert_eq!(references.swapchain.len(), 1);
        assert_eq!(references.swapchain[0].attachment, SWAPCHAIN_ATTACHMENT);
    }

    #[test]
    fn dependencies_chain_the_two_subpasses() {
        let [first, middle, last] = compositing_dependencies();

        assert_eq!(first.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(first.dst_subpass, COLOR_SUBPASS);

        assert_eq!(middle.src_subpass, COLOR_SUBPASS);
        assert_eq!(middle.dst_subpass, COMPOSITION_SUBPASS);
        assert_eq!(middle.dst_access_mask, vk::AccessFlags::INPUT_ATTACHMENT_READ);
        assert_eq!(middle.dst_stage_mask, vk::PipelineStageFlags::FRAGMENT_SHADER);

        assert_eq!(last.src_subpass, COMPOSITION_SUBPASS);
        assert_eq!(last.dst_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(last.dst_access_mask, vk::AccessFlags::MEMORY_READ);

        assert!(compositing_dependencies()
            .iter()
            .all(|d| d.dependency_flags == vk::DependencyFlags::BY_REGION));
    }
}
