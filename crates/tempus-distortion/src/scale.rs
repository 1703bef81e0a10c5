//! Per-entity local time scale

use std::collections::BTreeMap;

use tempus_core::{BubbleId, EntityId, Vec3};

/// Derived time scale attached to an entity inside a bubble
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTimeScale {
    pub value: f32,
    /// Bubble currently imposing `value`, if any
    pub bubble: Option<BubbleId>,
}

impl LocalTimeScale {
    pub const NORMAL: LocalTimeScale = LocalTimeScale {
        value: 1.0,
        bubble: None,
    };
}

impl Default for LocalTimeScale {
    fn default() -> Self {
        Self::NORMAL
    }
}

/// Source of entity positions sampled by the bubble manager
pub trait PositionProvider {
    /// Visit every time-scaled entity with its current position
    fn visit_positions(&self, visit: &mut dyn FnMut(EntityId, Vec3));
}

impl PositionProvider for [(EntityId, Vec3)] {
    fn visit_positions(&self, visit: &mut dyn FnMut(EntityId, Vec3)) {
        for &(entity, position) in self {
            visit(entity, position);
        }
    }
}

impl PositionProvider for Vec<(EntityId, Vec3)> {
    fn visit_positions(&self, visit: &mut dyn FnMut(EntityId, Vec3)) {
        self.as_slice().visit_positions(visit);
    }
}

impl PositionProvider for BTreeMap<EntityId, Vec3> {
    fn visit_positions(&self, visit: &mut dyn FnMut(EntityId, Vec3)) {
        for (&entity, &position) in self {
            visit(entity, position);
        }
    }
}

/// Sparse map of time scale attachments
///
/// Entities without an attachment run at normal speed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeScaleMap {
    entries: BTreeMap<EntityId, LocalTimeScale>,
}

impl TimeScaleMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective scale, 1.0 without an attachment
    #[inline]
    pub fn value(&self, entity: EntityId) -> f32 {
        self.entries.get(&entity).map_or(1.0, |s| s.value)
    }

    pub fn get(&self, entity: EntityId) -> Option<LocalTimeScale> {
        self.entries.get(&entity).copied()
    }

    pub fn attach(&mut self, entity: EntityId, scale: LocalTimeScale) {
        self.entries.insert(entity, scale);
    }

    /// Drop every attachment imposed by `bubble`; returns how many were dropped
    pub fn strip_bubble(&mut self, bubble: BubbleId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, s| s.bubble != Some(bubble));
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, LocalTimeScale)> + '_ {
        self.entries.iter().map(|(&e, &s)| (e, s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attachment_is_normal_speed() {
        let map = TimeScaleMap::new();
        assert_eq!(map.value(EntityId(4)), 1.0);
        assert!(map.get(EntityId(4)).is_none());
    }

    #[test]
    fn test_strip_bubble() {
        let mut map = TimeScaleMap::new();
        for (entity, bubble) in [(1, 7), (2, 7), (3, 8)] {
            map.attach(
                EntityId(entity),
                LocalTimeScale {
                    value: 0.5,
                    bubble: Some(BubbleId(bubble)),
                },
            );
        }
        assert_eq!(map.strip_bubble(BubbleId(7)), 2);
        assert_eq!(map.len(), 1);
        assert_eq!(map.value(EntityId(1)), 1.0);
        assert_eq!(map.value(EntityId(3)), 0.5);
    }

    #[test]
    fn test_provider_visits_in_order() {
        let positions = vec![
            (EntityId(2), Vec3::new(1.0, 0.0, 0.0)),
            (EntityId(1), Vec3::ZERO),
        ];
        let mut seen = Vec::new();
        positions.visit_positions(&mut |e, _| seen.push(e));
        assert_eq!(seen, vec![EntityId(2), EntityId(1)]);
    }
}
