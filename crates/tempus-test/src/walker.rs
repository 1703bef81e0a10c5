//! Walkers - moving test entities
//!
//! Walkers move in straight lines and bounce off a square boundary. Their
//! speed is multiplied by the local time scale last copied in with
//! [`WalkerField::set_scales`], so a walker inside a stasis bubble stands still.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::Arc;

use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempus_core::{EntityId, TempusResult, Tick, Vec3};
use tempus_distortion::{PositionProvider, TimeScaleMap};
use tempus_history::{BlockReader, BlockWriter, Rewindable};
use tempus_time::PhaseContext;
use tracing::trace;

/// Block tag of the walker field
pub const WALKER_BLOCK_TAG: u16 = 0x7E01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Walker {
    pub id: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
}

/// Every walker plus the scales applied to them
#[derive(Clone, Debug, Default)]
pub struct WalkerField {
    walkers: BTreeMap<EntityId, Walker>,
    scales: BTreeMap<EntityId, f32>,
    /// Half extent of the square arena on x/z
    bounds: f32,
}

/// Field shared between the registered producer and the test driving it
pub type SharedWalkers = Arc<RwLock<WalkerField>>;

impl WalkerField {
    pub fn new(bounds: f32) -> Self {
        WalkerField {
            walkers: BTreeMap::new(),
            scales: BTreeMap::new(),
            bounds: bounds.abs().max(1.0),
        }
    }

    /// `count` walkers with seeded positions and velocities
    pub fn random(count: usize, bounds: f32, seed: u64) -> Self {
        let mut field = WalkerField::new(bounds);
        let mut rng = StdRng::seed_from_u64(seed);
        let b = field.bounds;
        for i in 0..count {
            let position = Vec3::new(rng.gen_range(-b..b), 0.0, rng.gen_range(-b..b));
            let velocity = Vec3::new(rng.gen_range(-5.0..5.0), 0.0, rng.gen_range(-5.0..5.0));
            field.spawn(EntityId(i as u64 + 1), position, velocity);
        }
        field
    }

    pub fn into_shared(self) -> SharedWalkers {
        Arc::new(RwLock::new(self))
    }

    pub fn spawn(&mut self, id: EntityId, position: Vec3, velocity: Vec3) {
        self.walkers.insert(
            id,
            Walker {
                id,
                position,
                velocity,
            },
        );
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Walker> {
        self.scales.remove(&id);
        self.walkers.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&Walker> {
        self.walkers.get(&id)
    }

    /// Walkers in id order
    pub fn walkers(&self) -> Vec<Walker> {
        self.walkers.values().copied().collect()
    }

    pub fn positions(&self) -> Vec<(EntityId, Vec3)> {
        self.walkers.values().map(|w| (w.id, w.position)).collect()
    }

    /// Bit-level digest of every walker's position and velocity
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for walker in self.walkers.values() {
            hasher.write_u64(walker.id.0);
            for v in [walker.position, walker.velocity] {
                hasher.write_u32(v.x.to_bits());
                hasher.write_u32(v.y.to_bits());
                hasher.write_u32(v.z.to_bits());
            }
        }
        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.walkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkers.is_empty()
    }

    /// Copy the current local time scales for the next advance
    pub fn set_scales(&mut self, scales: &TimeScaleMap) {
        self.scales.clear();
        for (entity, scale) in scales.iter() {
            if self.walkers.contains_key(&entity) {
                self.scales.insert(entity, scale.value);
            }
        }
    }

    pub fn scale_of(&self, id: EntityId) -> f32 {
        self.scales.get(&id).copied().unwrap_or(1.0)
    }

    fn step(&mut self, dt: f32) {
        let b = self.bounds;
        for walker in self.walkers.values_mut() {
            let scale = self.scales.get(&walker.id).copied().unwrap_or(1.0);
            let step = dt * scale;
            walker.position.x += walker.velocity.x * step;
            walker.position.z += walker.velocity.z * step;
            if walker.position.x.abs() > b {
                walker.velocity.x = -walker.velocity.x;
                walker.position.x = walker.position.x.clamp(-b, b);
            }
            if walker.position.z.abs() > b {
                walker.velocity.z = -walker.velocity.z;
                walker.position.z = walker.position.z.clamp(-b, b);
            }
        }
    }
}

impl PositionProvider for WalkerField {
    fn visit_positions(&self, visit: &mut dyn FnMut(EntityId, Vec3)) {
        for walker in self.walkers.values() {
            visit(walker.id, walker.position);
        }
    }
}

/// Registry adapter over a [`SharedWalkers`] handle
pub struct WalkerProducer {
    field: SharedWalkers,
}

impl WalkerProducer {
    pub fn new(field: SharedWalkers) -> Self {
        WalkerProducer { field }
    }
}

impl Rewindable for WalkerProducer {
    fn name(&self) -> &str {
        "walkers"
    }

    fn tag(&self) -> u16 {
        WALKER_BLOCK_TAG
    }

    fn advance(&mut self, ctx: &PhaseContext) {
        self.field.write().step(ctx.dt_seconds);
    }

    fn write(&self, _tick: Tick, out: &mut BlockWriter) {
        let field = self.field.read();
        out.put_u32(field.walkers.len() as u32);
        for walker in field.walkers.values() {
            out.put_entity(walker.id);
            for v in [walker.position, walker.velocity] {
                out.put_f32(v.x);
                out.put_f32(v.y);
                out.put_f32(v.z);
            }
        }
    }

    fn load(&mut self, input: &mut BlockReader) -> TempusResult<()> {
        let count = input.get_u32()?;
        let mut field = self.field.write();
        let mut skipped = 0;
        for _ in 0..count {
            let id = input.get_entity()?;
            let position = Vec3::new(input.get_f32()?, input.get_f32()?, input.get_f32()?);
            let velocity = Vec3::new(input.get_f32()?, input.get_f32()?, input.get_f32()?);
            match field.walkers.get_mut(&id) {
                Some(walker) => {
                    walker.position = position;
                    walker.velocity = velocity;
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            trace!(skipped, "stale walkers skipped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempus_distortion::LocalTimeScale;

    #[test]
    fn test_random_field_is_seeded() {
        let a = WalkerField::random(8, 50.0, 7);
        let b = WalkerField::random(8, 50.0, 7);
        let c = WalkerField::random(8, 50.0, 8);
        assert_eq!(a.walkers(), b.walkers());
        assert_ne!(a.walkers(), c.walkers());
    }

    #[test]
    fn test_stasis_scale_freezes_walker() {
        let mut field = WalkerField::new(100.0);
        field.spawn(EntityId(1), Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
        field.spawn(EntityId(2), Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));

        let mut scales = TimeScaleMap::new();
        scales.attach(
            EntityId(1),
            LocalTimeScale {
                value: 0.0,
                bubble: None,
            },
        );
        field.set_scales(&scales);
        field.step(1.0);

        assert_eq!(field.get(EntityId(1)).unwrap().position, Vec3::ZERO);
        assert_eq!(field.get(EntityId(2)).unwrap().position.x, 1.0);
    }

    #[test]
    fn test_bounce_stays_in_bounds() {
        let mut field = WalkerField::new(2.0);
        field.spawn(EntityId(1), Vec3::new(1.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        field.step(1.0);
        let walker = *field.get(EntityId(1)).unwrap();
        assert_eq!(walker.position.x, 2.0);
        assert_eq!(walker.velocity.x, -1.0);
    }
}
