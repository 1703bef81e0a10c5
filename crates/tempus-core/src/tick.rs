//! Tick primitive for Tempus
//!
//! The tick is the only unit of time inside the core. Wall-clock time never
//! enters a decision, which keeps runs reproducible.

use std::fmt;
use std::ops::{Add, Sub};

/// Discrete simulation step counter
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Tick(pub u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);
    pub const MAX: Tick = Tick(u64::MAX);

    #[inline]
    pub fn new(value: u64) -> Self {
        Tick(value)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// The following tick
    #[inline]
    pub fn next(self) -> Self {
        Tick(self.0.saturating_add(1))
    }

    /// `self - ticks`, floored at zero
    #[inline]
    pub fn saturating_sub(self, ticks: u64) -> Self {
        Tick(self.0.saturating_sub(ticks))
    }

    #[inline]
    pub fn saturating_add(self, ticks: u64) -> Self {
        Tick(self.0.saturating_add(ticks))
    }

    /// Distance between two ticks regardless of order
    #[inline]
    pub fn abs_diff(self, other: Tick) -> u64 {
        self.0.abs_diff(other.0)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        Tick(u64::from_le_bytes(bytes))
    }
}

impl Add<u64> for Tick {
    type Output = Tick;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl Sub<u64> for Tick {
    type Output = Tick;

    #[inline]
    fn sub(self, rhs: u64) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sub<Tick> for Tick {
    type Output = u64;

    /// Elapsed ticks; zero when `rhs` is later
    #[inline]
    fn sub(self, rhs: Tick) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

impl fmt::Debug for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tick {}", self.0)
    }
}
