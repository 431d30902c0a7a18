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

/// Hands out shadow-map slots: layers of the 2D shadow array for directional
/// and spot lights, cube slots of the cube array for point lights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShadowSlotAllocator {
    maps: Vec<bool>,
    cubemaps: Vec<bool>,
}

impl ShadowSlotAllocator {
    /// An allocator with the given capacities.
    pub fn new(max_maps: u32, max_cubemaps: u32) -> Self {
        Self {
            maps: vec![false; max_maps as usize],
            cubemaps: vec![false; max_cubemaps as usize],
        }
    }

    fn pool(&mut self, cube: bool) -> &mut Vec<bool> {
        if cube {
            &mut self.cubemaps
        } else {
            &mut self.maps
        }
    }

    /// Takes the lowest free slot of the pool, or `None` when it is full.
    pub fn allocate(&mut self, cube: bool) -> Option<u32> {
        let pool = self.pool(cube);
        let slot = pool.iter().position(|used| !used)?;
        pool[slot] = true;
        Some(slot as u32)
    }

    /// Returns a slot to its pool.
    pub fn free(&mut self, cube: bool, slot: u32) {
        if let Some(used) = self.pool(cube).get_mut(slot as usize) {
            *used = false;
        }
    }

    /// Slots in use in a pool.
    pub fn used(&self, cube: bool) -> usize {
        let pool = if cube { &self.cubemaps } else { &self.maps };
        pool.iter().filter(|used| **used).count()
    }

    /// Capacity of the 2D array and of the cube array.
    pub fn capacity(&self) -> (u32, u32) {
        (self.maps.len() as u32, self.cubemaps.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_are_independent_and_reuse_freed_slots() {
        let mut slots = ShadowSlotAllocator::new(2, 1);
        assert_eq!(slots.allocate(false), Some(0));
        assert_eq!(slots.allocate(true), Some(0));
        assert_eq!(slots.allocate(true), None);
        assert_eq!(slots.allocate(false), Some(1));
        slots.free(false, 0);
        assert_eq!(slots.allocate(false), Some(0));
        assert_eq!(slots.used(false), 2);
    }
}
