// Queue family resolution
//
// Finds the graphics and present families of a device. Both roles are
// usually served by one family; when they differ the presentation chain
// has to share its images concurrently between the two.

use ash::vk;
use std::collections::BTreeSet;

use super::probe::CapabilityProbe;
use crate::error::SetupResult;

/// Family indices serving the graphics and present roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Scan the device's families in index order.
    ///
    /// Returns `None` when either role stays unassigned. The first graphics
    /// family and the first family able to present win; scanning stops as
    /// soon as both are known.
    pub fn resolve<P: CapabilityProbe>(
        probe: &P,
        device: P::Device,
    ) -> SetupResult<Option<Self>> {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in probe.queue_families(device).iter().enumerate() {
            let index = index as u32;

            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }

            // Present support is independent of the graphics bit
            if probe.present_support(device, index)? && present.is_none() {
                present = Some(index);
            }

            if let (Some(graphics), Some(present)) = (graphics, present) {
                return Ok(Some(Self { graphics, present }));
            }
        }

        Ok(None)
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Distinct families, one queue create info each
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present])
            .into_iter()
            .collect()
    }

    /// Image sharing mode and the family list that goes with it
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.is_shared() {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        } else {
            (
                vk::SharingMode::CONCURRENT,
                vec![self.graphics, self.present],
            )
        }
    }
}
