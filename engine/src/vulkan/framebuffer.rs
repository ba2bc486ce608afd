use anyhow::Result;
use log::*;
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};
use vulkanalia::Device;

use crate::error::SampleError;

/// Framebuffer creation and destruction, implemented by [`Device`].
pub trait FramebufferDevice {
    unsafe fn new_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer>;

    unsafe fn drop_framebuffer(&self, framebuffer: vk::Framebuffer);
}

impl FramebufferDevice for Device {
    unsafe fn new_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer> {
        let info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        Ok(DeviceV1_0::create_framebuffer(self, &info, None)
            .map_err(SampleError::driver("create framebuffer"))?)
    }

    unsafe fn drop_framebuffer(&self, framebuffer: vk::Framebuffer) {
        DeviceV1_0::destroy_framebuffer(self, framebuffer, None);
    }
}

/// One framebuffer per swapchain image.
#[derive(Clone, Debug, Default)]
pub struct VulkanFramebuffer {
    pub framebuffers: Vec<vk::Framebuffer>,
    /// Extent the current framebuffers were created with.
    pub extent: vk::Extent2D,
}

impl VulkanFramebuffer {
    /// Destroys the previous framebuffers, then creates one per entry of
    /// `swapchain_views`, each followed by `extra_views`.
    pub unsafe fn recreate<D: FramebufferDevice + ?Sized>(
        &mut self,
        device: &D,
        render_pass: vk::RenderPass,
        swapchain_views: &[vk::ImageView],
        extra_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<()> {
        self.destroy(device);

        for view in swapchain_views {
            let attachments = framebuffer_attachments(*view, extra_views);
            let framebuffer = device.new_framebuffer(render_pass, &attachments, extent)?;
            self.framebuffers.push(framebuffer);
        }
        self.extent = extent;

        debug!(
            "Created {} framebuffers {}x{}.",
            self.framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(())
    }

    pub unsafe fn destroy<D: FramebufferDevice + ?Sized>(&mut self, device: &D) {
        self.framebuffers
            .drain(..)
            .for_each(|f| device.drop_framebuffer(f));
    }
}

/// The swapchain view always comes first.
pub fn framebuffer_attachments(
    swapchain_view: vk::ImageView,
    extra_views: &[vk::ImageView],
) -> Vec<vk::ImageView> {
    std::iter::once(swapchain_view)
        .chain(extra_views.iter().copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use vulkanalia::vk::Handle;

    /// Hands out increasing handles and remembers every call.
    #[derive(Default)]
    struct FakeDevice {
        next: Cell<u64>,
        created: RefCell<Vec<(vk::Framebuffer, Vec<vk::ImageView>, vk::Extent2D)>>,
        destroyed: RefCell<Vec<vk::Framebuffer>>,
    }

    impl FramebufferDevice for FakeDevice {
        unsafe fn new_framebuffer(
            &self,
            _render_pass: vk::RenderPass,
            attachments: &[vk::ImageView],
            extent: vk::Extent2D,
        ) -> Result<vk::Framebuffer> {
            self.next.set(self.next.get() + 1);
            let framebuffer = vk::Framebuffer::from_raw(self.next.get());
            self.created
                .borrow_mut()
                .push((framebuffer, attachments.to_vec(), extent));
            Ok(framebuffer)
        }

        unsafe fn drop_framebuffer(&self, framebuffer: vk::Framebuffer) {
            self.destroyed.borrow_mut().push(framebuffer);
        }
    }

    fn views(raw: &[u64]) -> Vec<vk::ImageView> {
        raw.iter().map(|r| vk::ImageView::from_raw(*r)).collect()
    }

    #[test]
    fn swapchain_view_precedes_offscreen_views() {
        let swapchain = vk::ImageView::from_raw(1);
        let extra = [2, 3, 4].map(vk::ImageView::from_raw);

        assert_eq!(
            framebuffer_attachments(swapchain, &extra),
            vec![swapchain, extra[0], extra[1], extra[2]]
        );
    }

    #[test]
    fn no_extra_views_gives_a_single_attachment() {
        let swapchain = vk::ImageView::from_raw(7);
        assert_eq!(framebuffer_attachments(swapchain, &[]), vec![swapchain]);
    }

    #[test]
    fn recreate_replaces_every_framebuffer_once() {
        let device = FakeDevice::default();
        let render_pass = vk::RenderPass::from_raw(99);
        let extra = views(&[20, 21, 22]);
        let small = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let large = vk::Extent2D {
            width: 1920,
            height: 1080,
        };

        let mut framebuffers = VulkanFramebuffer::default();
        unsafe {
            framebuffers
                .recreate(&device, render_pass, &views(&[10, 11, 12]), &extra, small)
                .unwrap();
        }
        let first = framebuffers.framebuffers.clone();
        assert_eq!(first.len(), 3);
        assert_eq!(framebuffers.extent, small);
        assert!(device.destroyed.borrow().is_empty());

        unsafe {
            framebuffers
                .recreate(&device, render_pass, &views(&[30, 31, 32]), &extra, large)
                .unwrap();
        }

        assert_eq!(*device.destroyed.borrow(), first);
        assert_eq!(framebuffers.framebuffers.len(), 3);
        assert!(framebuffers.framebuffers.iter().all(|f| !first.contains(f)));
        assert_eq!(framebuffers.extent, large);

        let created = device.created.borrow();
        for (framebuffer, attachments, extent) in created.iter().skip(3) {
            assert!(framebuffers.framebuffers.contains(framebuffer));
            assert_eq!(*extent, large);
            assert_eq!(&attachments[1..], &extra[..]);
        }
        assert_eq!(
            created.iter().skip(3).map(|c| c.1[0]).collect::<Vec<_>>(),
            views(&[30, 31, 32])
        );
    }

    #[test]
    fn destroy_releases_each_framebuffer_once() {
        let device = FakeDevice::default();
        let extent = vk::Extent2D {
            width: 640,
            height: 480,
        };

        let mut framebuffers = VulkanFramebuffer::default();
        unsafe {
            framebuffers
                .recreate(&device, vk::RenderPass::null(), &views(&[1, 2]), &[], extent)
                .unwrap();
            framebuffers.destroy(&device);
            framebuffers.destroy(&device);
        }

        let created = device
            .created
            .borrow()
            .iter()
            .map(|c| c.0)
            .collect::<Vec<_>>();
        assert_eq!(*device.destroyed.borrow(), created);
        assert!(framebuffers.framebuffers.is_empty());
    }
}
