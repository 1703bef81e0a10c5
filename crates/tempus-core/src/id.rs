//! Identity types for Tempus
//!
//! Entity ids come from the host simulation; bubble ids are issued by the
//! bubble manager. Source and player ids are placeholders carried for
//! attribution only, there is no replication protocol behind them.

use std::fmt;

/// Entity identity - assigned by the host simulation
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(pub u64);

impl EntityId {
    pub const ZERO: EntityId = EntityId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        EntityId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        EntityId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time bubble identity - monotonically issued, never reused
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BubbleId(pub u64);

impl BubbleId {
    /// Never issued; marks "no bubble"
    pub const NONE: BubbleId = BubbleId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        BubbleId(id)
    }

    #[inline]
    pub fn next(self) -> Self {
        BubbleId(self.0.saturating_add(1))
    }
}

impl fmt::Debug for BubbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bubble({})", self.0)
    }
}

impl fmt::Display for BubbleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of a command or distortion (a player action, a miracle instance, ...)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SourceId(pub u64);

impl SourceId {
    pub const ZERO: SourceId = SourceId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        SourceId(id)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({:016x})", self.0)
    }
}

/// Player slot
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PlayerId(pub u8);

impl PlayerId {
    pub const LOCAL: PlayerId = PlayerId(0);

    #[inline]
    pub fn new(id: u8) -> Self {
        PlayerId(id)
    }
}

impl fmt::Debug for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::new(0xDEADBEEF_CAFEBABE);
        assert_eq!(EntityId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_bubble_id_next_saturates() {
        assert_eq!(BubbleId::NONE.next(), BubbleId(1));
        assert_eq!(BubbleId(u64::MAX).next(), BubbleId(u64::MAX));
    }

    #[test]
    fn test_entity_id_ordering() {
        let mut ids = vec![EntityId(3), EntityId(1), EntityId(2)];
        ids.sort();
        assert_eq!(ids, vec![EntityId(1), EntityId(2), EntityId(3)]);
    }
}
