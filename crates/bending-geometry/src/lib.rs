//! # Bending Geometry
//!
//! Collision geometry for ability simulation.
//!
//! Abilities describe the space they occupy with one or more [`Collider`]s.
//! Once per collision pass the core gathers every collider of every active
//! ability and needs the pairs that touch. This crate provides:
//!
//! - **Shapes**: [`Aabb`], [`Sphere`] and [`Ray`] (a finite segment)
//! - **Narrow phase**: [`Collider::intersects`] for every shape combination
//! - **Broad phase**: a Morton-sorted [`Bvh`] that reports overlapping bounds
//!
//! ## Quick Start
//!
//! ```
//! use bending_geometry::{Aabb, Bvh, Collider, Sphere};
//! use glam::Vec3;
//!
//! let colliders = vec![
//!     Collider::Sphere(Sphere::new(Vec3::ZERO, 1.0)),
//!     Collider::Aabb(Aabb::from_center(Vec3::new(1.5, 0.0, 0.0), Vec3::splat(0.75))),
//!     Collider::Sphere(Sphere::new(Vec3::new(40.0, 0.0, 0.0), 1.0)),
//! ];
//!
//! let bvh = Bvh::build(colliders.iter().enumerate().map(|(i, c)| (c.bounds(), i)));
//! let touching: Vec<_> = bvh
//!     .query_all()
//!     .into_iter()
//!     .filter(|(a, b)| colliders[**a].intersects(&colliders[**b]))
//!     .collect();
//!
//! assert_eq!(touching.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bvh;
pub mod collider;
pub mod morton;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-exports for convenience
pub use bvh::Bvh;
pub use collider::{Collider, Ray, Sphere};

/// Errors raised when constructing geometry from untrusted values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// A coordinate was NaN or infinite.
    #[error("non-finite coordinate in {0}")]
    NonFinite(&'static str),
    /// The minimum corner exceeds the maximum corner on some axis.
    #[error("inverted bounds: min {min} > max {max}")]
    Inverted {
        /// Minimum corner as given
        min: Vec3,
        /// Maximum corner as given
        max: Vec3,
    },
    /// A radius was negative.
    #[error("negative radius {0}")]
    NegativeRadius(f32),
}

/// Convenience alias for geometry results.
pub type Result<T> = std::result::Result<T, GeometryError>;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// A box with both corners at the origin.
    pub const ZERO: Self = Self {
        min: Vec3::ZERO,
        max: Vec3::ZERO,
    };

    /// Create a box from two corners, in any order.
    #[must_use]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a box from corners that must already be ordered and finite.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NonFinite`] for NaN/infinite input and
    /// [`GeometryError::Inverted`] when `min > max` on any axis.
    pub fn try_new(min: Vec3, max: Vec3) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() {
            return Err(GeometryError::NonFinite("aabb"));
        }
        if min.cmpgt(max).any() {
            return Err(GeometryError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Create a box from its center and half extents.
    #[must_use]
    pub fn from_center(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// The unit box occupied by the block whose minimum corner is `corner`.
    #[must_use]
    pub fn block(corner: Vec3) -> Self {
        Self {
            min: corner,
            max: corner + Vec3::ONE,
        }
    }

    /// Get the center of the box.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get half the size of the box along each axis.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Get the size of the box.
    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if a point is inside the box (inclusive).
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Check if two boxes overlap. Touching faces count as overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    /// Check if this box intersects a sphere.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }

    /// Smallest box containing both boxes.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Expand the box by `amount` on every side.
    #[must_use]
    pub fn grow(&self, amount: Vec3) -> Self {
        Self {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

    /// The same box translated so its center sits at `center`.
    #[must_use]
    pub fn at(&self, center: Vec3) -> Self {
        Self::from_center(center, self.half_extents())
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_corners() {
        let aabb = Aabb::new(Vec3::new(2.0, -1.0, 3.0), Vec3::new(-2.0, 1.0, 0.0));
        assert_eq!(aabb.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(2.0, 1.0, 3.0));
    }

    #[test]
    fn try_new_rejects_inverted_and_nan() {
        assert!(matches!(
            Aabb::try_new(Vec3::ONE, Vec3::ZERO),
            Err(GeometryError::Inverted { .. })
        ));
        assert_eq!(
            Aabb::try_new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::ONE),
            Err(GeometryError::NonFinite("aabb"))
        );
        assert!(Aabb::try_new(Vec3::ZERO, Vec3::ONE).is_ok());
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb::block(Vec3::ZERO);
        let b = Aabb::block(Vec3::new(1.0, 0.0, 0.0));
        let c = Aabb::block(Vec3::new(2.5, 0.0, 0.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn sphere_test_uses_closest_point() {
        let aabb = Aabb::block(Vec3::ZERO);
        assert!(aabb.intersects_sphere(Vec3::new(1.5, 0.5, 0.5), 0.6));
        // Corner distance is sqrt(3) * 0.5 ~ 0.87 from (1.5, 1.5, 1.5)
        assert!(!aabb.intersects_sphere(Vec3::new(1.5, 1.5, 1.5), 0.8));
    }

    #[test]
    fn at_keeps_extents() {
        let aabb = Aabb::from_center(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0));
        let moved = aabb.at(Vec3::splat(10.0));
        assert_eq!(moved.center(), Vec3::splat(10.0));
        assert_eq!(moved.half_extents(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::block(Vec3::ZERO);
        let b = Aabb::block(Vec3::new(4.0, -3.0, 1.0));
        let u = a.union(&b);
        assert!(u.contains(a.min) && u.contains(b.max));
    }

    #[test]
    fn aabb_serializes() {
        let aabb = Aabb::block(Vec3::ONE);
        let json = serde_json::to_string(&aabb).unwrap();
        let back: Aabb = serde_json::from_str(&json).unwrap();
        assert_eq!(aabb, back);
    }
}
