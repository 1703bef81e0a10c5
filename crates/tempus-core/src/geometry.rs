//! Geometry for spatial time effects
//!
//! World space is y-up. Bubble containment is measured on the horizontal
//! (x/z) plane, so height never takes an entity out of a bubble.

use std::ops::{Add, Sub};

/// 3D position (y-up)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline]
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    /// Distance projected onto the x/z plane
    #[inline]
    pub fn horizontal_distance(&self, other: &Vec3) -> f32 {
        self.horizontal_distance_sq(other).sqrt()
    }

    #[inline]
    pub fn horizontal_distance_sq(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        dx * dx + dz * dz
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Sphere volume; containment is tested horizontally
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Sphere { center, radius }
    }

    /// Horizontal containment, boundary inclusive
    #[inline]
    pub fn contains_horizontal(&self, point: &Vec3) -> bool {
        self.center.horizontal_distance_sq(point) <= self.radius * self.radius
    }
}
