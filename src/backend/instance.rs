// Vulkan instance
//
// Loads the Vulkan library and creates the instance with the surface
// extensions the window system needs. When diagnostics are enabled the
// requested layers are checked up front and a messenger create-info is
// chained so instance creation itself is covered by validation output.

use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::ffi::{c_char, c_void, CStr, CString};
use std::sync::Arc;

use super::diagnostics::{messenger_create_info, DiagnosticsSink};
use crate::error::{SetupError, SetupResult};

/// Instance wrapper, destroys the instance when the last owner goes away
pub struct Instance {
    handle: ash::Instance,
    entry: Entry,
    // Boxed so the messenger's user-data pointer stays valid until after
    // vkDestroyInstance.
    sink: Box<Arc<dyn DiagnosticsSink>>,
}

impl Instance {
    pub fn new(
        app_name: &str,
        display: RawDisplayHandle,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> SetupResult<Arc<Self>> {
        log::info!("Creating Vulkan instance: {}", app_name);

        let entry = unsafe { Entry::load() }?;
        let sink = Box::new(sink);
        let diagnostics = sink.enabled();

        if diagnostics {
            Self::check_layer_support(&entry, sink.layers())?;
        }

        let app_name = CString::new(app_name).unwrap_or_else(|_| c"Vulkan".to_owned());
        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
            .map_err(SetupError::query("required instance extensions"))?
            .to_vec();
        if diagnostics {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }
        Self::log_available_extensions(&entry, &extensions);

        let layer_names: Vec<*const c_char> =
            sink.layers().iter().map(|name| name.as_ptr()).collect();

        let user_data = &*sink as *const Arc<dyn DiagnosticsSink> as *mut c_void;
        let mut debug_info = messenger_create_info(user_data);

        let mut create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);
        if diagnostics {
            create_info = create_info.push_next(&mut debug_info);
        }

        let handle = unsafe { entry.create_instance(&create_info, None) }
            .map_err(SetupError::creation("instance"))?;

        Ok(Arc::new(Self {
            handle,
            entry,
            sink,
        }))
    }

    fn check_layer_support(entry: &Entry, requested: &[CString]) -> SetupResult<()> {
        let available = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(SetupError::query("instance layers"))?;

        let names: Vec<&CStr> = available
            .iter()
            .map(|props| unsafe { CStr::from_ptr(props.layer_name.as_ptr()) })
            .collect();

        match first_missing_layer(&names, requested) {
            Some(layer) => Err(SetupError::MissingLayer(
                layer.to_string_lossy().into_owned(),
            )),
            None => Ok(()),
        }
    }

    fn log_available_extensions(entry: &Entry, enabled: &[*const c_char]) {
        let available = match unsafe { entry.enumerate_instance_extension_properties(None) } {
            Ok(available) => available,
            Err(e) => {
                log::warn!("Could not list instance extensions: {:?}", e);
                return;
            }
        };

        log::debug!("Instance extensions ({} enabled):", enabled.len());
        for props in &available {
            let name = unsafe { CStr::from_ptr(props.extension_name.as_ptr()) };
            let on = enabled
                .iter()
                .any(|&ptr| unsafe { CStr::from_ptr(ptr) } == name);
            log::debug!("\t{} {}", if on { "[X]" } else { "[ ]" }, name.to_string_lossy());
        }
    }

    pub fn raw(&self) -> &ash::Instance {
        &self.handle
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.sink.enabled()
    }

    pub(crate) fn sink_ptr(&self) -> *mut c_void {
        &*self.sink as *const Arc<dyn DiagnosticsSink> as *mut c_void
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance");
        unsafe {
            self.handle.destroy_instance(None);
        }
    }
}

/// First requested layer the loader does not offer
fn first_missing_layer<'a>(available: &[&CStr], requested: &'a [CString]) -> Option<&'a CString> {
    requested
        .iter()
        .find(|layer| !available.contains(&layer.as_c_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_requested_layers_present() {
        let available = [c"VK_LAYER_KHRONOS_validation", c"VK_LAYER_MESA_overlay"];
        let requested = vec![CString::new("VK_LAYER_KHRONOS_validation").unwrap()];
        assert_eq!(first_missing_layer(&available, &requested), None);
        assert_eq!(first_missing_layer(&available, &[]), None);
    }

    #[test]
    fn reports_the_first_absent_layer() {
        let available = [c"VK_LAYER_KHRONOS_validation"];
        let requested = vec![
            CString::new("VK_LAYER_KHRONOS_validation").unwrap(),
            CString::new("VK_LAYER_LUNARG_api_dump").unwrap(),
            CString::new("VK_LAYER_LUNARG_monitor").unwrap(),
        ];
        assert_eq!(
            first_missing_layer(&available, &requested).map(|l| l.to_str().unwrap()),
            Some("VK_LAYER_LUNARG_api_dump")
        );
        assert!(first_missing_layer(&[], &requested).is_some());
    }
}
