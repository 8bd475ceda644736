//! Vulkan device and surface negotiation.
//!
//! Goes from a window to a selected GPU, a logical device, a swapchain with
//! its image views and a configured graphics pipeline. The decisions along
//! the way (which device, which queue families, which format/mode/extent)
//! are plain functions over the [`backend::CapabilityProbe`] trait.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{SetupError, SetupResult};
