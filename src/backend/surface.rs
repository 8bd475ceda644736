// Window surface
//
// Wraps the native window in a VkSurfaceKHR through ash-window.

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

use super::Instance;
use crate::error::{SetupError, SetupResult};

pub struct Surface {
    loader: ash::khr::surface::Instance,
    handle: vk::SurfaceKHR,
    _instance: Arc<Instance>,
}

impl Surface {
    pub fn new(
        instance: Arc<Instance>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> SetupResult<Self> {
        let handle = unsafe {
            ash_window::create_surface(instance.entry(), instance.raw(), display, window, None)
        }
        .map_err(SetupError::creation("window surface"))?;

        let loader = ash::khr::surface::Instance::new(instance.entry(), instance.raw());

        Ok(Self {
            loader,
            handle,
            _instance: instance,
        })
    }

    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("Destroying surface");
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}
