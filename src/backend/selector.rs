// Physical device selection
//
// Each candidate goes through the same staged checks:
//   features -> queue families -> extensions -> surface support
// A candidate failing any stage scores 0. Survivors are scored with a
// discrete-GPU bonus plus the largest supported 2D image dimension, and any
// qualified discrete GPU outranks every other kind whatever the scores.

use std::ffi::CString;

use super::probe::{
    verify_extensions, CapabilityProbe, DeviceInfo, DeviceKind, ExtensionCheck,
    ExtensionsVerified, SurfaceSupport,
};
use super::queues::QueueFamilies;
use crate::error::{SetupError, SetupResult};

/// Scoring weights and hard requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub discrete_bonus: u32,
    pub required_extensions: Vec<CString>,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            discrete_bonus: 1000,
            required_extensions: vec![ash::khr::swapchain::NAME.to_owned()],
        }
    }
}

impl SelectionPolicy {
    pub fn score(&self, info: &DeviceInfo) -> u64 {
        let bonus = match info.kind {
            DeviceKind::Discrete => u64::from(self.discrete_bonus),
            DeviceKind::Integrated | DeviceKind::Other => 0,
        };
        bonus + u64::from(info.max_image_dimension_2d)
    }
}

/// Why a candidate scored 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoGeometryShader,
    IncompleteQueueFamilies,
    MissingExtensions(Vec<String>),
    NoSurfaceFormats,
    NoPresentModes,
    ZeroScore,
}

/// A device that passed every stage
#[derive(Debug, Clone)]
pub struct Qualified<D> {
    pub device: D,
    pub info: DeviceInfo,
    pub queues: QueueFamilies,
    pub extensions: ExtensionsVerified<D>,
    pub support: SurfaceSupport,
    pub score: u64,
}

impl<D> Qualified<D> {
    /// Ordering key: device class first, score within the class
    pub fn rank(&self) -> (bool, u64) {
        (self.info.kind == DeviceKind::Discrete, self.score)
    }
}

#[derive(Debug)]
pub enum Evaluation<D> {
    Qualified(Qualified<D>),
    Rejected(DeviceInfo, Rejection),
}

/// Run one candidate through the staged checks.
pub fn evaluate<P: CapabilityProbe>(
    probe: &P,
    device: P::Device,
    policy: &SelectionPolicy,
) -> SetupResult<Evaluation<P::Device>> {
    let info = probe.device_info(device);

    if !info.geometry_shader {
        return Ok(Evaluation::Rejected(info, Rejection::NoGeometryShader));
    }

    let Some(queues) = QueueFamilies::resolve(probe, device)? else {
        return Ok(Evaluation::Rejected(info, Rejection::IncompleteQueueFamilies));
    };

    let extensions = match verify_extensions(probe, device, &policy.required_extensions)? {
        ExtensionCheck::Verified(token) => token,
        ExtensionCheck::Missing(names) => {
            return Ok(Evaluation::Rejected(info, Rejection::MissingExtensions(names)));
        }
    };

    let support = SurfaceSupport::query(probe, &extensions)?;
    if support.formats.is_empty() {
        return Ok(Evaluation::Rejected(info, Rejection::NoSurfaceFormats));
    }
    if support.present_modes.is_empty() {
        return Ok(Evaluation::Rejected(info, Rejection::NoPresentModes));
    }

    let score = policy.score(&info);
    if score == 0 {
        return Ok(Evaluation::Rejected(info, Rejection::ZeroScore));
    }

    Ok(Evaluation::Qualified(Qualified {
        device,
        info,
        queues,
        extensions,
        support,
        score,
    }))
}

/// Pick the best candidate: discrete before anything else, then the highest
/// score. Ties keep the first one enumerated.
pub fn select<P: CapabilityProbe>(
    probe: &P,
    policy: &SelectionPolicy,
) -> SetupResult<Qualified<P::Device>> {
    let candidates = probe.enumerate()?;
    log::info!("Found {} physical device(s)", candidates.len());

    let mut best: Option<Qualified<P::Device>> = None;

    for &device in &candidates {
        match evaluate(probe, device, policy)? {
            Evaluation::Qualified(qualified) => {
                log::debug!(
                    "Candidate {} ({:?}): score {}",
                    qualified.info.name,
                    qualified.info.kind,
                    qualified.score
                );
                if best.as_ref().map_or(true, |b| qualified.rank() > b.rank()) {
                    best = Some(qualified);
                }
            }
            Evaluation::Rejected(info, reason) => {
                log::debug!("Candidate {} rejected: {:?}", info.name, reason);
            }
        }
    }

    let best = best.ok_or(SetupError::UnsupportedHardware {
        candidates: candidates.len(),
    })?;

    log::info!("GPU: {} ({})", best.info.name, best.score);
    log::info!(
        "Queue families: graphics {}, present {}",
        best.queues.graphics,
        best.queues.present
    );

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::negotiate::{self, PREFERRED_FORMAT};
    use crate::backend::probe::fake::{FakeDevice, FakeProbe};
    use ash::vk;

    #[test]
    fn discrete_beats_integrated_with_larger_limits() {
        let probe = FakeProbe::new(vec![
            FakeDevice::capable("integrated", DeviceKind::Integrated, 16384),
            FakeDevice::capable("discrete", DeviceKind::Discrete, 8192),
        ]);
        let best = select(&probe, &SelectionPolicy::default()).unwrap();

        assert_eq!(best.device, 1);
        assert_eq!(best.info.name, "discrete");
        assert_eq!(best.score, 1000 + 8192);
    }

    #[test]
    fn ties_keep_the_first_candidate() {
        let probe = FakeProbe::new(vec![
            FakeDevice::capable("first", DeviceKind::Discrete, 4096),
            FakeDevice::capable("second", DeviceKind::Discrete, 4096),
        ]);
        let best = select(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(best.info.name, "first");
    }

    #[test]
    fn discrete_wins_even_against_a_higher_score() {
        let probe = FakeProbe::new(vec![
            FakeDevice::capable("integrated", DeviceKind::Integrated, 16384),
            FakeDevice::capable("discrete", DeviceKind::Discrete, 4096),
        ]);
        let policy = SelectionPolicy {
            discrete_bonus: 0,
            ..Default::default()
        };
        let best = select(&probe, &policy).unwrap();
        assert_eq!(best.info.name, "discrete");
        assert_eq!(best.score, 4096);
    }

    #[test]
    fn bonus_only_shifts_discrete_scores() {
        let policy = SelectionPolicy {
            discrete_bonus: 250,
            ..Default::default()
        };
        let discrete = FakeDevice::capable("d", DeviceKind::Discrete, 4096).info;
        let integrated = FakeDevice::capable("i", DeviceKind::Integrated, 4096).info;
        assert_eq!(policy.score(&discrete), 4346);
        assert_eq!(policy.score(&integrated), 4096);
    }

    #[test]
    fn score_decides_within_a_class() {
        let probe = FakeProbe::new(vec![
            FakeDevice::capable("small", DeviceKind::Integrated, 4096),
            FakeDevice::capable("large", DeviceKind::Integrated, 8192),
            FakeDevice::capable("other", DeviceKind::Other, 16384),
        ]);
        let best = select(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(best.info.name, "other");

        let probe = FakeProbe::new(vec![
            FakeDevice::capable("small", DeviceKind::Integrated, 4096),
            FakeDevice::capable("large", DeviceKind::Integrated, 8192),
        ]);
        let best = select(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(best.info.name, "large");
    }

    #[test]
    fn missing_geometry_shader_is_rejected_before_any_query() {
        let mut device = FakeDevice::capable("gpu", DeviceKind::Discrete, 16384);
        device.info.geometry_shader = false;
        let probe = FakeProbe::new(vec![device]);

        match evaluate(&probe, 0, &SelectionPolicy::default()).unwrap() {
            Evaluation::Rejected(_, reason) => assert_eq!(reason, Rejection::NoGeometryShader),
            Evaluation::Qualified(_) => panic!("device should be rejected"),
        }
        assert!(probe.present_queries.borrow().is_empty());
        assert!(probe.surface_queries.borrow().is_empty());
    }

    #[test]
    fn surface_is_never_queried_without_the_extension() {
        let mut lacking = FakeDevice::capable("no-swapchain", DeviceKind::Discrete, 16384);
        lacking.extensions.clear();
        let probe = FakeProbe::new(vec![
            lacking,
            FakeDevice::capable("fallback", DeviceKind::Integrated, 4096),
        ]);

        let best = select(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(best.info.name, "fallback");
        assert_eq!(*probe.surface_queries.borrow(), vec![1]);
    }

    #[test]
    fn each_suitability_failure_is_reported() {
        let policy = SelectionPolicy::default();

        let mut no_queues = FakeDevice::capable("a", DeviceKind::Discrete, 1);
        no_queues.families = vec![(vk::QueueFlags::TRANSFER, false)];
        let mut no_formats = FakeDevice::capable("b", DeviceKind::Discrete, 1);
        no_formats.formats.clear();
        let mut no_modes = FakeDevice::capable("c", DeviceKind::Discrete, 1);
        no_modes.present_modes.clear();
        let mut no_ext = FakeDevice::capable("d", DeviceKind::Discrete, 1);
        no_ext.extensions = vec![CString::new("VK_KHR_maintenance1").unwrap()];
        let probe = FakeProbe::new(vec![no_queues, no_formats, no_modes, no_ext]);

        let reasons: Vec<Rejection> = (0..4)
            .map(|device| match evaluate(&probe, device, &policy).unwrap() {
                Evaluation::Rejected(_, reason) => reason,
                Evaluation::Qualified(q) => panic!("{} should be rejected", q.info.name),
            })
            .collect();

        assert_eq!(
            reasons,
            vec![
                Rejection::IncompleteQueueFamilies,
                Rejection::NoSurfaceFormats,
                Rejection::NoPresentModes,
                Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]),
            ]
        );
    }

    #[test]
    fn no_suitable_device_is_fatal() {
        let mut device = FakeDevice::capable("gpu", DeviceKind::Discrete, 16384);
        device.info.geometry_shader = false;
        let probe = FakeProbe::new(vec![device]);

        let err = select(&probe, &SelectionPolicy::default()).unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedHardware { candidates: 1 }));

        let empty = FakeProbe::new(Vec::new());
        let err = select(&empty, &SelectionPolicy::default()).unwrap_err();
        assert!(matches!(err, SetupError::UnsupportedHardware { candidates: 0 }));
    }

    #[test]
    fn zero_score_never_qualifies() {
        let probe = FakeProbe::new(vec![FakeDevice::capable("weak", DeviceKind::Other, 0)]);
        assert!(select(&probe, &SelectionPolicy::default()).is_err());
    }

    #[test]
    fn single_discrete_device_end_to_end() {
        let format_a = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT,
        };
        let mut device = FakeDevice::capable("gpu", DeviceKind::Discrete, 16384);
        device.formats = vec![format_a];
        device.present_modes = vec![vk::PresentModeKHR::FIFO];
        let probe = FakeProbe::new(vec![device]);

        let best = select(&probe, &SelectionPolicy::default()).unwrap();
        assert_eq!(best.score, 1000 + 16384);

        let requested = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let config =
            negotiate::negotiate(&best.support, requested, vk::PresentModeKHR::MAILBOX).unwrap();
        assert_ne!(config.format, PREFERRED_FORMAT.format);
        assert_eq!(config.format, format_a.format);
        assert_eq!(config.color_space, format_a.color_space);
        assert_eq!(config.present_mode, vk::PresentModeKHR::FIFO);
        assert_eq!((config.extent.width, config.extent.height), (800, 600));
        assert_eq!(config.image_count, 3);
    }

    #[test]
    fn repeated_selection_negotiates_equal_configurations() {
        let probe = FakeProbe::new(vec![
            FakeDevice::capable("integrated", DeviceKind::Integrated, 8192),
            FakeDevice::capable("discrete", DeviceKind::Discrete, 8192),
        ]);
        let policy = SelectionPolicy::default();
        let requested = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let first = select(&probe, &policy).unwrap();
        let second = select(&probe, &policy).unwrap();
        assert_eq!(first.device, second.device);
        assert_eq!(first.queues, second.queues);

        let a = negotiate::negotiate(&first.support, requested, vk::PresentModeKHR::MAILBOX)
            .unwrap();
        let b = negotiate::negotiate(&second.support, requested, vk::PresentModeKHR::MAILBOX)
            .unwrap();
        assert_eq!(a, b);
    }
}
