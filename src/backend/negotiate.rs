// Surface negotiation
//
// Turns the capability triple reported for a surface into concrete choices:
// format, present mode, extent and image count. Pure functions only, so the
// same inputs always give the same configuration.

use ash::vk;

use super::probe::SurfaceSupport;
use crate::error::{SetupError, SetupResult};

/// BGRA8 sRGB with a nonlinear color space, used whenever it's offered
pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// `currentExtent` value meaning "the swapchain decides"
pub const EXTENT_DEFINED_BY_SWAPCHAIN: u32 = u32::MAX;

/// Concrete presentation choices for one surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceConfiguration {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Preferred format if listed, otherwise the first one reported.
pub fn choose_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

/// `preferred` if listed, otherwise FIFO (always supported).
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Fixed current extent if the surface reports one, else `requested` clamped
/// component-wise into the reported bounds.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != EXTENT_DEFINED_BY_SWAPCHAIN {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One image beyond the minimum, capped by the maximum when one is declared
/// (`max_image_count == 0` means unbounded).
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count.min(capabilities.max_image_count)
    } else {
        count
    }
}

pub fn negotiate(
    support: &SurfaceSupport,
    requested: vk::Extent2D,
    preferred_mode: vk::PresentModeKHR,
) -> SetupResult<SurfaceConfiguration> {
    let format = choose_format(&support.formats).ok_or_else(|| {
        SetupError::IncompleteNegotiation("surface reports no formats".to_string())
    })?;
    if support.present_modes.is_empty() {
        return Err(SetupError::IncompleteNegotiation(
            "surface reports no present modes".to_string(),
        ));
    }

    let config = SurfaceConfiguration {
        format: format.format,
        color_space: format.color_space,
        present_mode: choose_present_mode(&support.present_modes, preferred_mode),
        extent: choose_extent(&support.capabilities, requested),
        image_count: choose_image_count(&support.capabilities),
        pre_transform: support.capabilities.current_transform,
    };

    log::info!(
        "Surface: {:?} / {:?}, {:?}, {}x{}, {} images",
        config.format,
        config.color_space,
        config.present_mode,
        config.extent.width,
        config.extent.height,
        config.image_count
    );

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn preferred_format_is_picked_wherever_it_is_listed() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn format_falls_back_to_first_entry() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_format(&formats).unwrap();
        assert_eq!(chosen.format, vk::Format::R16G16B16A16_SFLOAT);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::HDR10_ST2084_EXT);

        assert!(choose_format(&[]).is_none());
    }

    #[test]
    fn mailbox_when_offered_fifo_otherwise() {
        let preferred = vk::PresentModeKHR::MAILBOX;
        assert_eq!(
            choose_present_mode(
                &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
                preferred
            ),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(
                &[vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO],
                preferred
            ),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn fixed_current_extent_is_used_verbatim() {
        let capabilities = caps((800, 600), (1024, 1024), (2048, 2048));
        let extent = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 10,
                height: 10,
            },
        );
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn requested_extent_is_clamped_per_component() {
        let capabilities = caps((u32::MAX, u32::MAX), (100, 100), (1920, 1080));

        let inside = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 800,
                height: 600,
            },
        );
        assert_eq!((inside.width, inside.height), (800, 600));

        let outside = choose_extent(
            &capabilities,
            vk::Extent2D {
                width: 4000,
                height: 10,
            },
        );
        assert_eq!((outside.width, outside.height), (1920, 100));
    }

    #[test]
    fn image_count_is_one_above_minimum_within_bounds() {
        let mut capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);

        capabilities.max_image_count = 8;
        assert_eq!(choose_image_count(&capabilities), 3);

        capabilities.max_image_count = 2;
        assert_eq!(choose_image_count(&capabilities), 2);
    }

    #[test]
    fn negotiation_is_deterministic() {
        let support = SurfaceSupport {
            capabilities: caps((u32::MAX, u32::MAX), (1, 1), (4096, 4096)),
            formats: vec![format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR)],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let requested = vk::Extent2D {
            width: 1280,
            height: 720,
        };

        let first = negotiate(&support, requested, vk::PresentModeKHR::MAILBOX).unwrap();
        let second = negotiate(&support, requested, vk::PresentModeKHR::MAILBOX).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(first.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!((first.extent.width, first.extent.height), (1280, 720));
        assert_eq!(first.image_count, 3);
    }

    #[test]
    fn empty_lists_cannot_be_negotiated() {
        let support = SurfaceSupport {
            capabilities: caps((800, 600), (1, 1), (4096, 4096)),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let requested = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert!(matches!(
            negotiate(&support, requested, vk::PresentModeKHR::MAILBOX),
            Err(SetupError::IncompleteNegotiation(_))
        ));
    }
}
