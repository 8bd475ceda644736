// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Logical device creation for the selected physical device
// - One queue per unique family (graphics + present)
// - Required device extensions (swapchain)

use ash::vk;
use std::ffi::{c_char, CString};
use std::sync::Arc;

use super::queues::QueueFamilies;
use super::selector::Qualified;
use super::Instance;
use crate::error::{SetupError, SetupResult};

const QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Logical device with automatic cleanup
pub struct LogicalDevice {
    device: ash::Device,
    pub name: String,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub queue_families: QueueFamilies,

    instance: Arc<Instance>,
}

impl LogicalDevice {
    pub fn new(
        instance: Arc<Instance>,
        selected: &Qualified<vk::PhysicalDevice>,
        extensions: &[CString],
    ) -> SetupResult<Arc<Self>> {
        let queue_families = selected.queues;

        let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITIES)
            })
            .collect();

        let extension_names: Vec<*const c_char> =
            extensions.iter().map(|name| name.as_ptr()).collect();

        // Nothing beyond the core feature set is enabled
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .raw()
                .create_device(selected.device, &create_info, None)
        }
        .map_err(SetupError::creation("logical device"))?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        log::info!(
            "Created logical device on {} ({} queue famil{})",
            selected.info.name,
            queue_create_infos.len(),
            if queue_create_infos.len() == 1 { "y" } else { "ies" }
        );

        Ok(Arc::new(Self {
            device,
            name: selected.info.name.clone(),
            graphics_queue,
            present_queue,
            queue_families,
            instance,
        }))
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Wait for device to be idle (e.g., before rebuilding or cleanup)
    pub fn wait_idle(&self) -> SetupResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(SetupError::query("device idle"))
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        unsafe {
            self.device.destroy_device(None);
        }
    }
}
