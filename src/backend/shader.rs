// Shader module loading
//
// Vulkan consumes SPIR-V words. Binaries are read from disk once, and the
// modules built from them only live for the duration of pipeline creation.

use ash::vk;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::LogicalDevice;
use crate::error::{SetupError, SetupResult};

/// Resolve a shader path: as given if it exists, otherwise relative to the
/// directory holding the executable.
pub fn resolve_path(path: &Path) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }

    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(path)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}

/// Read a SPIR-V binary into properly aligned words
pub fn load_spirv(path: &Path) -> SetupResult<Vec<u32>> {
    let path = resolve_path(path);
    let missing = |source| SetupError::AssetMissing {
        path: path.clone(),
        source,
    };

    let bytes = std::fs::read(&path).map_err(missing)?;
    let words = ash::util::read_spv(&mut Cursor::new(&bytes)).map_err(missing)?;

    log::debug!("Loaded {:?} ({} words)", path, words.len());
    Ok(words)
}

/// Short-lived shader module, destroyed on drop
pub struct ShaderModule<'a> {
    pub handle: vk::ShaderModule,
    device: &'a LogicalDevice,
}

impl<'a> ShaderModule<'a> {
    pub fn new(device: &'a LogicalDevice, code: &[u32]) -> SetupResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);

        let handle = unsafe { device.raw().create_shader_module(&create_info, None) }
            .map_err(SetupError::creation("shader module"))?;

        Ok(Self { handle, device })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.raw().destroy_shader_module(self.handle, None);
        }
    }
}
