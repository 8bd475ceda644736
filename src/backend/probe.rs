// Capability probing
//
// Read-only queries about a physical device relative to one target surface.
// The decision logic (selection, queue resolution, negotiation) only talks to
// the `CapabilityProbe` trait, so the same code runs against a live Vulkan
// instance or an in-memory description of hardware.
//
// Ordering: surface support may only be queried on a device whose required
// extensions were verified first. `SurfaceSupport::query` takes the
// `ExtensionsVerified` token as proof, and the token can only be produced by
// `verify_extensions`.

use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};

use super::{Instance, Surface};
use crate::error::{SetupError, SetupResult};

/// Coarse device classification used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Discrete,
    Integrated,
    Other,
}

impl From<vk::PhysicalDeviceType> for DeviceKind {
    fn from(ty: vk::PhysicalDeviceType) -> Self {
        match ty {
            vk::PhysicalDeviceType::DISCRETE_GPU => DeviceKind::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => DeviceKind::Integrated,
            _ => DeviceKind::Other,
        }
    }
}

/// Properties and features relevant to selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub kind: DeviceKind,
    pub max_image_dimension_2d: u32,
    pub geometry_shader: bool,
}

/// Read access to the capabilities of candidate devices.
///
/// All surface-dependent queries are answered for the surface the probe was
/// created for. Errors are only returned when the underlying call fails.
pub trait CapabilityProbe {
    type Device: Copy + std::fmt::Debug;

    fn enumerate(&self) -> SetupResult<Vec<Self::Device>>;

    fn device_info(&self, device: Self::Device) -> DeviceInfo;

    fn queue_families(&self, device: Self::Device) -> Vec<vk::QueueFamilyProperties>;

    fn present_support(&self, device: Self::Device, family: u32) -> SetupResult<bool>;

    fn extensions(&self, device: Self::Device) -> SetupResult<Vec<CString>>;

    fn surface_capabilities(&self, device: Self::Device)
        -> SetupResult<vk::SurfaceCapabilitiesKHR>;

    fn surface_formats(&self, device: Self::Device) -> SetupResult<Vec<vk::SurfaceFormatKHR>>;

    fn present_modes(&self, device: Self::Device) -> SetupResult<Vec<vk::PresentModeKHR>>;
}

/// Proof that a device exposes every required extension
#[derive(Debug, Clone, Copy)]
pub struct ExtensionsVerified<D> {
    device: D,
}

impl<D: Copy> ExtensionsVerified<D> {
    pub fn device(&self) -> D {
        self.device
    }
}

/// Outcome of the extension stage
#[derive(Debug)]
pub enum ExtensionCheck<D> {
    Verified(ExtensionsVerified<D>),
    Missing(Vec<String>),
}

/// Check `required` against the extensions the device reports.
pub fn verify_extensions<P: CapabilityProbe>(
    probe: &P,
    device: P::Device,
    required: &[CString],
) -> SetupResult<ExtensionCheck<P::Device>> {
    let available: BTreeSet<CString> = probe.extensions(device)?.into_iter().collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect();

    if missing.is_empty() {
        Ok(ExtensionCheck::Verified(ExtensionsVerified { device }))
    } else {
        Ok(ExtensionCheck::Missing(missing))
    }
}

/// The surface capability triple of one device
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn query<P: CapabilityProbe>(
        probe: &P,
        verified: &ExtensionsVerified<P::Device>,
    ) -> SetupResult<Self> {
        let device = verified.device();
        Ok(Self {
            capabilities: probe.surface_capabilities(device)?,
            formats: probe.surface_formats(device)?,
            present_modes: probe.present_modes(device)?,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Probe backed by a live Vulkan instance and surface
pub struct VulkanProbe<'a> {
    instance: &'a Instance,
    surface: &'a Surface,
}

impl<'a> VulkanProbe<'a> {
    pub fn new(instance: &'a Instance, surface: &'a Surface) -> Self {
        Self { instance, surface }
    }
}

impl CapabilityProbe for VulkanProbe<'_> {
    type Device = vk::PhysicalDevice;

    fn enumerate(&self) -> SetupResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance.raw().enumerate_physical_devices() }
            .map_err(SetupError::query("physical devices"))
    }

    fn device_info(&self, device: vk::PhysicalDevice) -> DeviceInfo {
        let instance = self.instance.raw();
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        DeviceInfo {
            name,
            kind: properties.device_type.into(),
            max_image_dimension_2d: properties.limits.max_image_dimension2_d,
            geometry_shader: features.geometry_shader == vk::TRUE,
        }
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe {
            self.instance
                .raw()
                .get_physical_device_queue_family_properties(device)
        }
    }

    fn present_support(&self, device: vk::PhysicalDevice, family: u32) -> SetupResult<bool> {
        unsafe {
            self.surface.loader().get_physical_device_surface_support(
                device,
                family,
                self.surface.handle(),
            )
        }
        .map_err(SetupError::query("surface present support"))
    }

    fn extensions(&self, device: vk::PhysicalDevice) -> SetupResult<Vec<CString>> {
        let properties = unsafe {
            self.instance
                .raw()
                .enumerate_device_extension_properties(device)
        }
        .map_err(SetupError::query("device extensions"))?;

        Ok(properties
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
            .collect())
    }

    fn surface_capabilities(
        &self,
        device: vk::PhysicalDevice,
    ) -> SetupResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_capabilities(device, self.surface.handle())
        }
        .map_err(SetupError::query("surface capabilities"))
    }

    fn surface_formats(&self, device: vk::PhysicalDevice) -> SetupResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_formats(device, self.surface.handle())
        }
        .map_err(SetupError::query("surface formats"))
    }

    fn present_modes(&self, device: vk::PhysicalDevice) -> SetupResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.surface
                .loader()
                .get_physical_device_surface_present_modes(device, self.surface.handle())
        }
        .map_err(SetupError::query("surface present modes"))
    }
}


#[cfg(test)]
mod tests {
    use super::fake::{FakeDevice, FakeProbe};
    use super::*;

    fn swapchain_required() -> Vec<CString> {
        vec![ash::khr::swapchain::NAME.to_owned()]
    }

    #[test]
    fn device_kind_from_vulkan_type() {
        assert_eq!(
            DeviceKind::from(vk::PhysicalDeviceType::DISCRETE_GPU),
            DeviceKind::Discrete
        );
        assert_eq!(
            DeviceKind::from(vk::PhysicalDeviceType::INTEGRATED_GPU),
            DeviceKind::Integrated
        );
        assert_eq!(DeviceKind::from(vk::PhysicalDeviceType::CPU), DeviceKind::Other);
        assert_eq!(
            DeviceKind::from(vk::PhysicalDeviceType::VIRTUAL_GPU),
            DeviceKind::Other
        );
    }

    #[test]
    fn missing_extensions_are_named() {
        let mut device = FakeDevice::capable("gpu", DeviceKind::Discrete, 8192);
        device.extensions.clear();
        let probe = FakeProbe::new(vec![device]);

        match verify_extensions(&probe, 0, &swapchain_required()).unwrap() {
            ExtensionCheck::Missing(names) => assert_eq!(names, vec!["VK_KHR_swapchain"]),
            ExtensionCheck::Verified(_) => panic!("extension should be missing"),
        }
    }

    #[test]
    fn surface_support_reads_the_triple() {
        let probe = FakeProbe::new(vec![FakeDevice::capable("gpu", DeviceKind::Discrete, 8192)]);

        let verified = match verify_extensions(&probe, 0, &swapchain_required()).unwrap() {
            ExtensionCheck::Verified(token) => token,
            ExtensionCheck::Missing(names) => panic!("unexpected missing {:?}", names),
        };
        let support = SurfaceSupport::query(&probe, &verified).unwrap();

        assert!(support.is_adequate());
        assert_eq!(support.capabilities.min_image_count, 2);
        assert_eq!(support.formats.len(), 1);
        assert_eq!(support.present_modes.len(), 2);
        assert_eq!(*probe.surface_queries.borrow(), vec![0]);
    }

    #[test]
    fn empty_lists_are_inadequate() {
        let support = SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(!support.is_adequate());
    }
}
