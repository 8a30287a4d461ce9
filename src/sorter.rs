//! Sort-then-bucket: group tags sharing a unit and area into contiguous read commands.
//!
//! Grounded on `neu_tag_sort`/`tag_sort.c`'s generic sort callback plus Modbus's own
//! `tag_cmp`/`tag_sort` (`plugins/modbus/modbus_point.c`): tags are ordered by
//! `(unit, area, start, n_register)`, then folded left to right into groups, extending
//! each group's end as long as the next tag overlaps or abuts it and the group still fits
//! under the wire's per-PDU byte cap.

use crate::frame::Area;

/// Anything the sorter can bucket: a tag/point with an addressable span.
pub trait Sortable {
    fn unit(&self) -> u8;
    fn area(&self) -> Area;
    fn start(&self) -> u16;
    fn n_register(&self) -> u16;
}

/// A contiguous read command covering one or more tags.
#[derive(Debug, Clone)]
pub struct ReadGroup<T> {
    pub unit: u8,
    pub area: Area,
    pub start: u16,
    /// Registers (or bits, for coil areas) spanned, end-exclusive from `start`.
    pub count: u16,
    pub members: Vec<T>,
}

/// Bucket `items` into [`ReadGroup`]s, honoring `byte_cap` (the wire's per-PDU byte limit).
///
/// `items` need not be pre-sorted; this sorts a clone of the ordering key internally. Ties in
/// `(unit, area, start, n_register)` preserve their relative input order (stable sort), matching
/// `UT_array`-based insertion order in the original sort.
pub fn sort<T: Sortable + Clone>(items: &[T], byte_cap: usize) -> Vec<ReadGroup<T>> {
    let mut order: Vec<&T> = items.iter().collect();
    order.sort_by(|a, b| {
        (a.unit(), a.area() as u8, a.start(), a.n_register())
            .cmp(&(b.unit(), b.area() as u8, b.start(), b.n_register()))
    });

    let mut groups: Vec<ReadGroup<T>> = Vec::new();

    for tag in order {
        let fits_existing = groups.last().is_some_and(|g| {
            g.unit == tag.unit() && g.area == tag.area() && can_merge(g, tag, byte_cap)
        });

        if fits_existing {
            let g = groups.last_mut().unwrap();
            let new_end = tag.start() + tag.n_register();
            if new_end > g.start + g.count {
                g.count = new_end - g.start;
            }
            g.members.push(tag.clone());
        } else {
            groups.push(ReadGroup {
                unit: tag.unit(),
                area: tag.area(),
                start: tag.start(),
                count: tag.n_register(),
                members: vec![tag.clone()],
            });
        }
    }

    groups
}

/// `true` if `tag` can extend `group` without exceeding `byte_cap`, mirroring the original
/// `tag_sort` callback's area-specific byte accounting.
fn can_merge<T: Sortable>(group: &ReadGroup<T>, tag: &T, byte_cap: usize) -> bool {
    let end = group.start + group.count;
    if tag.start() > end {
        return false;
    }

    match group.area {
        Area::Coil | Area::DiscreteInput => {
            let used_bytes = group.count as usize / 8;
            used_bytes < byte_cap.saturating_sub(1)
        }
        Area::InputRegister | Area::HoldingRegister => {
            let now_bytes = group.count as usize * 2;
            let add_now = now_bytes + tag.n_register() as usize * 2;
            add_now < byte_cap
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Tag {
        unit: u8,
        area: Area,
        start: u16,
        n_register: u16,
    }

    impl Sortable for Tag {
        fn unit(&self) -> u8 {
            self.unit
        }
        fn area(&self) -> Area {
            self.area
        }
        fn start(&self) -> u16 {
            self.start
        }
        fn n_register(&self) -> u16 {
            self.n_register
        }
    }

    fn t(unit: u8, area: Area, start: u16, n: u16) -> Tag {
        Tag {
            unit,
            area,
            start,
            n_register: n,
        }
    }

    #[test]
    fn adjacent_registers_merge_into_one_group() {
        let tags = vec![
            t(1, Area::HoldingRegister, 0, 1),
            t(1, Area::HoldingRegister, 1, 1),
            t(1, Area::HoldingRegister, 2, 1),
        ];
        let groups = sort(&tags, 250);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].start, 0);
        assert_eq!(groups[0].count, 3);
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn different_units_never_merge() {
        let tags = vec![
            t(1, Area::HoldingRegister, 0, 1),
            t(2, Area::HoldingRegister, 0, 1),
        ];
        let groups = sort(&tags, 250);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn different_areas_never_merge() {
        let tags = vec![
            t(1, Area::HoldingRegister, 0, 1),
            t(1, Area::InputRegister, 0, 1),
        ];
        let groups = sort(&tags, 250);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn gap_beyond_end_splits_into_new_group() {
        let tags = vec![
            t(1, Area::HoldingRegister, 0, 1),
            t(1, Area::HoldingRegister, 100, 1),
        ];
        let groups = sort(&tags, 250);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn byte_cap_forces_a_new_group() {
        // Each tag is 2 registers (4 bytes); a cap of 8 bytes admits only one more after the
        // first before `add_now >= byte_cap` rejects the third.
        let tags = vec![
            t(1, Area::HoldingRegister, 0, 2),
            t(1, Area::HoldingRegister, 2, 2),
            t(1, Area::HoldingRegister, 4, 2),
        ];
        let groups = sort(&tags, 8);
        assert!(groups.len() >= 2);
    }

    #[test]
    fn coil_group_respects_bit_byte_cap() {
        let tags: Vec<Tag> = (0..20)
            .map(|i| t(1, Area::Coil, i, 1))
            .collect();
        let groups = sort(&tags, 2);
        assert!(groups.iter().all(|g| g.count as usize / 8 < 1));
    }
}
