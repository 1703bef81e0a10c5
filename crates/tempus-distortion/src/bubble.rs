//! Time Bubbles - spatial local time scale overrides
//!
//! Each tick the manager drops expired bubbles, then assigns every sampled
//! entity the effective scale of the nearest active bubble containing it
//! (horizontal distance, boundary inclusive). Equal distances resolve to the
//! earliest spawned bubble. `priority` is carried on every bubble but the
//! resolution does not consult it yet.

use serde::{Deserialize, Serialize};
use tempus_core::{BubbleId, EntityId, Sphere, TempusError, TempusResult, Tick, Vec3};
use tempus_history::{BlockReader, BlockWriter, Rewindable};
use tracing::debug;

use crate::{LocalTimeScale, PositionProvider, TimeScaleMap};

/// Block tag of the bubble set in tick records
pub const BUBBLE_BLOCK_TAG: u16 = 0x0B01;

/// How a bubble distorts time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BubbleMode {
    /// Slowed time, 0 < scale < 1
    Scale = 0,
    /// Accelerated time, scale > 1
    FastForward = 1,
    /// Frozen time
    Stasis = 2,
}

impl BubbleMode {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(BubbleMode::Scale),
            1 => Some(BubbleMode::FastForward),
            2 => Some(BubbleMode::Stasis),
            _ => None,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Clamping bounds for spawned bubbles
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleLimits {
    pub min_radius: f32,
    pub max_radius: f32,
    /// Lowest scale a `Scale` bubble may impose
    pub min_slow_scale: f32,
    /// Highest scale a `FastForward` bubble may impose
    pub max_fast_scale: f32,
}

impl Default for BubbleLimits {
    fn default() -> Self {
        BubbleLimits {
            min_radius: 0.1,
            max_radius: 500.0,
            min_slow_scale: 0.05,
            max_fast_scale: 8.0,
        }
    }
}

impl BubbleLimits {
    pub fn clamp_radius(&self, radius: f32) -> f32 {
        if radius.is_nan() {
            return self.min_radius;
        }
        radius.clamp(self.min_radius, self.max_radius.max(self.min_radius))
    }

    /// Force a scale into the range its mode implies
    pub fn clamp_scale(&self, mode: BubbleMode, scale: f32) -> f32 {
        let scale = if scale.is_nan() { 1.0 } else { scale };
        match mode {
            BubbleMode::Stasis => 0.0,
            BubbleMode::Scale => scale.clamp(self.min_slow_scale.min(1.0), 1.0),
            BubbleMode::FastForward => scale.clamp(1.0, self.max_fast_scale.max(1.0)),
        }
    }
}

/// A spatial time distortion
#[derive(Clone, Debug, PartialEq)]
pub struct TimeBubble {
    pub id: BubbleId,
    pub mode: BubbleMode,
    pub scale: f32,
    pub priority: u8,
    pub owner_id: u8,
    /// Opaque reference to whatever created the bubble
    pub source_ref: u64,
    /// Lifetime in ticks, 0 = unbounded
    pub duration_ticks: u32,
    pub created_at_tick: Tick,
    pub is_active: bool,
    pub volume: Sphere,
}

impl TimeBubble {
    /// Scale imposed on contained entities
    #[inline]
    pub fn effective_scale(&self) -> f32 {
        match self.mode {
            BubbleMode::Stasis => 0.0,
            BubbleMode::Scale | BubbleMode::FastForward => self.scale,
        }
    }

    /// Still within its lifetime at `tick`
    #[inline]
    pub fn is_alive_at(&self, tick: Tick) -> bool {
        self.duration_ticks == 0 || self.created_at_tick + self.duration_ticks as u64 > tick
    }

    fn write(&self, out: &mut BlockWriter) {
        out.put_u64(self.id.0);
        out.put_u8(self.mode.to_byte());
        out.put_f32(self.scale);
        out.put_u8(self.priority);
        out.put_u8(self.owner_id);
        out.put_u64(self.source_ref);
        out.put_u32(self.duration_ticks);
        out.put_tick(self.created_at_tick);
        out.put_bool(self.is_active);
        out.put_f32(self.volume.center.x);
        out.put_f32(self.volume.center.y);
        out.put_f32(self.volume.center.z);
        out.put_f32(self.volume.radius);
    }

    fn read(input: &mut BlockReader) -> TempusResult<Self> {
        let id = BubbleId(input.get_u64()?);
        let mode_byte = input.get_u8()?;
        let mode = BubbleMode::from_byte(mode_byte).ok_or_else(|| {
            TempusError::InvalidValue {
                tag: BUBBLE_BLOCK_TAG,
                reason: format!("unknown bubble mode {mode_byte} for {id}"),
            }
        })?;
        Ok(TimeBubble {
            id,
            mode,
            scale: input.get_f32()?,
            priority: input.get_u8()?,
            owner_id: input.get_u8()?,
            source_ref: input.get_u64()?,
            duration_ticks: input.get_u32()?,
            created_at_tick: input.get_tick()?,
            is_active: input.get_bool()?,
            volume: {
                let center = Vec3::new(input.get_f32()?, input.get_f32()?, input.get_f32()?);
                Sphere::new(center, input.get_f32()?)
            },
        })
    }
}

/// Owns every bubble and the attachments they produce
#[derive(Debug)]
pub struct BubbleManager {
    limits: BubbleLimits,
    /// Spawn order
    bubbles: Vec<TimeBubble>,
    next_id: BubbleId,
    /// Last tick passed to `update`; new bubbles are created at this tick
    now: Tick,
    scales: TimeScaleMap,
}

impl BubbleManager {
    pub fn new(limits: BubbleLimits) -> Self {
        BubbleManager {
            limits,
            bubbles: Vec::new(),
            next_id: BubbleId(1),
            now: Tick::ZERO,
            scales: TimeScaleMap::new(),
        }
    }

    /// Spawn a bubble; radius and scale are clamped to the limits
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        &mut self,
        center: Vec3,
        radius: f32,
        mode: BubbleMode,
        scale: f32,
        duration_ticks: u32,
        priority: u8,
        owner_id: u8,
        source_ref: u64,
    ) -> BubbleId {
        let id = self.next_id;
        self.next_id = id.next();

        let bubble = TimeBubble {
            id,
            mode,
            scale: self.limits.clamp_scale(mode, scale),
            priority,
            owner_id,
            source_ref,
            duration_ticks,
            created_at_tick: self.now,
            is_active: true,
            volume: Sphere::new(center, self.limits.clamp_radius(radius)),
        };
        debug!(
            %id,
            ?mode,
            scale = bubble.scale,
            radius = bubble.volume.radius,
            duration_ticks,
            "bubble spawned"
        );
        self.bubbles.push(bubble);
        id
    }

    /// Slow zone
    pub fn slow(&mut self, center: Vec3, radius: f32, scale: f32, duration_ticks: u32) -> BubbleId {
        self.spawn(center, radius, BubbleMode::Scale, scale, duration_ticks, 0, 0, 0)
    }

    /// Frozen zone
    pub fn freeze(&mut self, center: Vec3, radius: f32, duration_ticks: u32) -> BubbleId {
        self.spawn(center, radius, BubbleMode::Stasis, 0.0, duration_ticks, 0, 0, 0)
    }

    /// Accelerated zone
    pub fn accelerate(
        &mut self,
        center: Vec3,
        radius: f32,
        scale: f32,
        duration_ticks: u32,
    ) -> BubbleId {
        self.spawn(center, radius, BubbleMode::FastForward, scale, duration_ticks, 0, 0, 0)
    }

    /// Remove a bubble and strip the attachments it imposed
    pub fn remove(&mut self, id: BubbleId) -> Option<TimeBubble> {
        let index = self.bubbles.iter().position(|b| b.id == id)?;
        let bubble = self.bubbles.remove(index);
        let stripped = self.scales.strip_bubble(id);
        debug!(%id, stripped, "bubble removed");
        Some(bubble)
    }

    /// Remove every bubble created by `source_ref`
    pub fn remove_by_source(&mut self, source_ref: u64) -> Vec<BubbleId> {
        let ids: Vec<BubbleId> = self
            .bubbles
            .iter()
            .filter(|b| b.source_ref == source_ref)
            .map(|b| b.id)
            .collect();
        for &id in &ids {
            self.remove(id);
        }
        ids
    }

    /// Returns false if no such bubble exists
    pub fn set_active(&mut self, id: BubbleId, active: bool) -> bool {
        match self.bubbles.iter_mut().find(|b| b.id == id) {
            Some(bubble) => {
                bubble.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Resolve local time scale for every sampled entity at `tick`
    ///
    /// The attachment map is rebuilt from the sampled entities, so entities
    /// outside every bubble or no longer sampled lose their attachment.
    /// Returns the bubbles that expired and were removed.
    pub fn update(&mut self, tick: Tick, positions: &dyn PositionProvider) -> Vec<BubbleId> {
        self.now = tick;

        let expired: Vec<BubbleId> = self
            .bubbles
            .iter()
            .filter(|b| !b.is_alive_at(tick))
            .map(|b| b.id)
            .collect();
        for &id in &expired {
            self.remove(id);
        }

        let active: Vec<&TimeBubble> = self.bubbles.iter().filter(|b| b.is_active).collect();
        let mut scales = TimeScaleMap::new();
        positions.visit_positions(&mut |entity, position| {
            let mut nearest: Option<(&TimeBubble, f32)> = None;
            for &bubble in &active {
                let d_sq = bubble.volume.center.horizontal_distance_sq(&position);
                if d_sq > bubble.volume.radius * bubble.volume.radius {
                    continue;
                }
                if nearest.map_or(true, |(_, best)| d_sq < best) {
                    nearest = Some((bubble, d_sq));
                }
            }
            if let Some((bubble, _)) = nearest {
                scales.attach(
                    entity,
                    LocalTimeScale {
                        value: bubble.effective_scale(),
                        bubble: Some(bubble.id),
                    },
                );
            }
        });
        self.scales = scales;

        expired
    }

    pub fn get(&self, id: BubbleId) -> Option<&TimeBubble> {
        self.bubbles.iter().find(|b| b.id == id)
    }

    /// Bubbles in spawn order
    pub fn iter(&self) -> impl Iterator<Item = &TimeBubble> {
        self.bubbles.iter()
    }

    pub fn len(&self) -> usize {
        self.bubbles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bubbles.is_empty()
    }

    /// 1.0 for entities without an attachment
    #[inline]
    pub fn local_time_scale(&self, entity: EntityId) -> f32 {
        self.scales.value(entity)
    }

    pub fn attachment(&self, entity: EntityId) -> Option<LocalTimeScale> {
        self.scales.get(entity)
    }

    pub fn scales(&self) -> &TimeScaleMap {
        &self.scales
    }

    pub fn limits(&self) -> &BubbleLimits {
        &self.limits
    }
}

impl Default for BubbleManager {
    fn default() -> Self {
        Self::new(BubbleLimits::default())
    }
}

impl Rewindable for BubbleManager {
    fn name(&self) -> &str {
        "bubbles"
    }

    fn tag(&self) -> u16 {
        BUBBLE_BLOCK_TAG
    }

    fn write(&self, _tick: Tick, out: &mut BlockWriter) {
        out.put_u64(self.next_id.0);
        out.put_tick(self.now);
        out.put_u32(self.bubbles.len() as u32);
        for bubble in &self.bubbles {
            bubble.write(out);
        }
        out.put_u32(self.scales.len() as u32);
        for (entity, scale) in self.scales.iter() {
            out.put_entity(entity);
            out.put_f32(scale.value);
            out.put_u64(scale.bubble.unwrap_or(BubbleId::NONE).0);
        }
    }

    fn load(&mut self, input: &mut BlockReader) -> TempusResult<()> {
        let next_id = BubbleId(input.get_u64()?);
        let now = input.get_tick()?;
        let count = input.get_u32()? as usize;
        let mut bubbles = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            bubbles.push(TimeBubble::read(input)?);
        }
        let attached = input.get_u32()? as usize;
        let mut scales = TimeScaleMap::new();
        for _ in 0..attached {
            let entity = input.get_entity()?;
            let value = input.get_f32()?;
            let bubble = BubbleId(input.get_u64()?);
            scales.attach(
                entity,
                LocalTimeScale {
                    value,
                    bubble: (bubble != BubbleId::NONE).then_some(bubble),
                },
            );
        }

        // Only overwrite once the whole block decoded
        self.next_id = next_id;
        self.now = now;
        self.bubbles = bubbles;
        self.scales = scales;
        Ok(())
    }
}
