//! Cache of the read plan (sorted tag groups) for a polling group, rebuilt only when the host
//! hands the driver a new tag list.
//!
//! The original recomputes `modbus_tag_sort` once per `neu_plugin_group_t` whenever its tag list
//! changes and reuses the result across every `group_timer` tick (`modbus_req.c`); this module is
//! that cache, generation-tagged so a stale read never silently lingers after a config update.

use crate::point::Point;
use crate::sorter::{self, ReadGroup};

/// Cached read groups for one polling group, plus the generation they were built from.
pub struct PlanCache {
    generation: u64,
    groups: Vec<ReadGroup<Point>>,
}

impl PlanCache {
    pub fn empty() -> Self {
        Self {
            generation: 0,
            groups: Vec::new(),
        }
    }

    /// Rebuild the plan from `tags` if `generation` has advanced past what's cached.
    pub fn refresh(&mut self, generation: u64, tags: &[Point], byte_cap: usize) {
        if generation == self.generation && !self.groups.is_empty() {
            return;
        }
        self.generation = generation;
        self.groups = sorter::sort(tags, byte_cap);
    }

    pub fn groups(&self) -> &[ReadGroup<Point>] {
        &self.groups
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
