// Validation diagnostics
//
// Validation output is delivered to a `DiagnosticsSink`. `Silent` turns the
// whole layer off (no layers requested, no messenger created); `LogSink`
// forwards every message to the `log` facade. Either way negotiation runs the
// same steps and reaches the same decisions.

use ash::vk;
use std::ffi::{c_void, CStr, CString};
use std::sync::Arc;

use super::Instance;
use crate::error::{SetupError, SetupResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Verbose,
    Info,
    Warning,
    Error,
}

impl From<vk::DebugUtilsMessageSeverityFlagsEXT> for Severity {
    fn from(flags: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Severity::Error
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Severity::Warning
        } else if flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Severity::Info
        } else {
            Severity::Verbose
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    General,
    Validation,
    Performance,
}

impl From<vk::DebugUtilsMessageTypeFlagsEXT> for Category {
    fn from(flags: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Category::Validation
        } else if flags.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Category::Performance
        } else {
            Category::General
        }
    }
}

/// Receiver for validation layer output
pub trait DiagnosticsSink: Send + Sync {
    /// Instance layers to enable. Empty means diagnostics are off.
    fn layers(&self) -> &[CString];

    fn report(&self, severity: Severity, category: Category, message: &str);

    fn enabled(&self) -> bool {
        !self.layers().is_empty()
    }
}

/// No layers, no messenger
#[derive(Debug, Default)]
pub struct Silent;

impl DiagnosticsSink for Silent {
    fn layers(&self) -> &[CString] {
        &[]
    }

    fn report(&self, _severity: Severity, _category: Category, _message: &str) {}
}

/// Forwards validation messages to `log`
#[derive(Debug)]
pub struct LogSink {
    layers: Vec<CString>,
}

impl LogSink {
    pub fn new(layers: Vec<CString>) -> Self {
        Self { layers }
    }
}

impl DiagnosticsSink for LogSink {
    fn layers(&self) -> &[CString] {
        &self.layers
    }

    fn report(&self, severity: Severity, category: Category, message: &str) {
        match severity {
            Severity::Error => log::error!("[Vulkan {:?}] {}", category, message),
            Severity::Warning => log::warn!("[Vulkan {:?}] {}", category, message),
            Severity::Info => log::info!("[Vulkan {:?}] {}", category, message),
            Severity::Verbose => log::trace!("[Vulkan {:?}] {}", category, message),
        }
    }
}

/// Pick the sink for a list of requested layers
pub fn sink_for(layers: Vec<CString>) -> Arc<dyn DiagnosticsSink> {
    if layers.is_empty() {
        Arc::new(Silent)
    } else {
        Arc::new(LogSink::new(layers))
    }
}

/// Messenger settings shared by instance creation and the persistent messenger.
///
/// `user_data` must point at an `Arc<dyn DiagnosticsSink>` that outlives the
/// messenger.
pub(crate) fn messenger_create_info<'a>(
    user_data: *mut c_void,
) -> vk::DebugUtilsMessengerCreateInfoEXT<'a> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(forward_to_sink))
        .user_data(user_data)
}

/// Debug messenger, destroyed before its instance
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    _instance: Arc<Instance>,
}

impl DebugMessenger {
    pub fn new(instance: Arc<Instance>) -> SetupResult<Self> {
        let loader = ash::ext::debug_utils::Instance::new(instance.entry(), instance.raw());
        let create_info = messenger_create_info(instance.sink_ptr());

        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }
            .map_err(SetupError::creation("debug messenger"))?;

        log::debug!("Debug messenger installed");

        Ok(Self {
            loader,
            messenger,
            _instance: instance,
        })
    }
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

unsafe extern "system" fn forward_to_sink(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_user_data.is_null() || p_callback_data.is_null() || (*p_callback_data).p_message.is_null()
    {
        return vk::FALSE;
    }

    let sink = &*(p_user_data as *const Arc<dyn DiagnosticsSink>);
    let message = CStr::from_ptr((*p_callback_data).p_message);

    sink.report(
        message_severity.into(),
        message_type.into(),
        &message.to_string_lossy(),
    );

    vk::FALSE
}
