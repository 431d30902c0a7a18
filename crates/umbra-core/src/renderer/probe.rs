// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Light probes: points where the environment is captured for image-based lighting.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Reach of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProbeKind {
    /// Affects the whole scene; may be fed from an equirectangular environment map.
    Global,
    /// Affects surfaces within `radius`, blending out towards the edge.
    Local {
        /// Influence radius in world units.
        radius: f32,
    },
}

/// A light probe.
#[derive(Debug, Clone, PartialEq)]
pub struct LightProbe {
    /// Capture position.
    pub position: Vec3,
    /// Reach of the probe.
    pub kind: ProbeKind,
    slot: Option<u32>,
    baked: bool,
}

impl LightProbe {
    /// A global probe at `position`.
    pub fn global(position: Vec3) -> Self {
        Self {
            position,
            kind: ProbeKind::Global,
            slot: None,
            baked: false,
        }
    }

    /// A local probe at `position` reaching `radius`.
    pub fn local(position: Vec3, radius: f32) -> Self {
        Self {
            kind: ProbeKind::Local {
                radius: radius.max(0.0),
            },
            ..Self::global(position)
        }
    }

    /// Slot in the irradiance / prefilter arrays.
    pub fn slot(&self) -> Option<u32> {
        self.slot
    }

    /// Assigns an array slot; the probe must be baked again.
    pub fn set_slot(&mut self, slot: Option<u32>) {
        self.slot = slot;
        self.baked = false;
    }

    /// Returns `true` if the probe arrays hold this probe's current data.
    pub fn is_baked(&self) -> bool {
        self.baked
    }

    /// Records that the probe was baked (or requests a re-bake).
    pub fn set_baked(&mut self, baked: bool) {
        self.baked = baked;
    }

    /// Influence radius; `f32::INFINITY` for global probes.
    pub fn radius(&self) -> f32 {
        match self.kind {
            ProbeKind::Global => f32::INFINITY,
            ProbeKind::Local { radius } => radius,
        }
    }

    /// Returns `true` for global probes.
    pub fn is_global(&self) -> bool {
        matches!(self.kind, ProbeKind::Global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassigning_slot_requires_rebake() {
        let mut probe = LightProbe::local(Vec3::ZERO, 4.0);
        probe.set_slot(Some(0));
        probe.set_baked(true);
        probe.set_slot(Some(1));
        assert!(!probe.is_baked());
        assert_eq!(probe.radius(), 4.0);
        assert!(LightProbe::global(Vec3::ONE).radius().is_infinite());
    }
}
