// Swapchain - Window presentation
//
// The chain of images presented to the window plus one view per image.
// Built in one go from a negotiated SurfaceConfiguration; any change
// (resize, new surface format) means dropping it and building a new one.

use ash::vk;
use std::sync::Arc;

use super::negotiate::SurfaceConfiguration;
use super::{LogicalDevice, Surface};
use crate::error::{SetupError, SetupResult};

pub struct PresentationChain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub config: SurfaceConfiguration,
    swapchain_loader: ash::khr::swapchain::Device,
    device: Arc<LogicalDevice>,
}

impl PresentationChain {
    pub fn build(
        device: Arc<LogicalDevice>,
        surface: &Surface,
        config: SurfaceConfiguration,
    ) -> SetupResult<Self> {
        log::info!(
            "Creating swapchain: {}x{}",
            config.extent.width,
            config.extent.height
        );

        let (sharing_mode, queue_family_indices) = device.queue_families.sharing();

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(config.image_count)
            .image_format(config.format)
            .image_color_space(config.color_space)
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&queue_family_indices)
            .pre_transform(config.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true);

        let swapchain_loader =
            ash::khr::swapchain::Device::new(device.instance().raw(), device.raw());

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None) }
            .map_err(SetupError::creation("swapchain"))?;

        // From here on Drop releases whatever was created if a later step fails
        let mut chain = Self {
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            config,
            swapchain_loader,
            device,
        };

        chain.images = unsafe { chain.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(SetupError::query("swapchain images"))?;

        log::info!(
            "Created swapchain with {} images ({:?} sharing)",
            chain.images.len(),
            sharing_mode
        );

        chain.image_views.reserve(chain.images.len());
        for index in 0..chain.images.len() {
            let view = chain.create_view(chain.images[index])?;
            chain.image_views.push(view);
        }

        Ok(chain)
    }

    fn create_view(&self, image: vk::Image) -> SetupResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(self.config.format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device.raw().create_image_view(&create_info, None) }
            .map_err(SetupError::creation("swapchain image view"))
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.config.extent
    }

    pub fn format(&self) -> vk::Format {
        self.config.format
    }
}

impl Drop for PresentationChain {
    fn drop(&mut self) {
        log::debug!("Destroying swapchain ({} views)", self.image_views.len());
        unsafe {
            for &view in &self.image_views {
                self.device.raw().destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}
