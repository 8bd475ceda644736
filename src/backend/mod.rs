// Backend module - Vulkan abstraction layer
//
// Design: Thin wrapper around ash. Decision logic (probe, selector, queues,
// negotiate) works against the `CapabilityProbe` trait; everything that owns
// a Vulkan handle releases it on drop.

pub mod context;
pub mod device;
pub mod diagnostics;
pub mod instance;
pub mod negotiate;
pub mod pipeline;
pub mod probe;
pub mod queues;
pub mod selector;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use context::{ContextSettings, GraphicsContext};
pub use device::LogicalDevice;
pub use instance::Instance;
pub use negotiate::SurfaceConfiguration;
pub use probe::{CapabilityProbe, DeviceInfo, DeviceKind, SurfaceSupport};
pub use queues::QueueFamilies;
pub use selector::SelectionPolicy;
pub use surface::Surface;
pub use swapchain::PresentationChain;
