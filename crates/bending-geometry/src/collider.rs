//! Collider shapes and narrow-phase intersection tests.
//!
//! Every shape pair has a dedicated test. Rays are finite segments running
//! from `origin` to `origin + direction`, so a ray's length is the length of
//! its direction vector.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Aabb, GeometryError, Result};

/// Distance below which two segments are considered touching.
const EPSILON: f32 = 1.0e-4;

/// A sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center
    pub center: Vec3,
    /// Radius
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere. Negative radii are clamped to zero.
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    /// Create a sphere, rejecting negative or non-finite input.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::NegativeRadius`] or [`GeometryError::NonFinite`].
    pub fn try_new(center: Vec3, radius: f32) -> Result<Self> {
        if !center.is_finite() || !radius.is_finite() {
            return Err(GeometryError::NonFinite("sphere"));
        }
        if radius < 0.0 {
            return Err(GeometryError::NegativeRadius(radius));
        }
        Ok(Self { center, radius })
    }

    /// Check if two spheres overlap.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let reach = self.radius + other.radius;
        self.center.distance_squared(other.center) <= reach * reach
    }
}

/// A finite segment from `origin` to `origin + direction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Start point
    pub origin: Vec3,
    /// Segment vector (not normalized)
    pub direction: Vec3,
}

impl Ray {
    /// A zero-length ray at the origin.
    pub const ZERO: Self = Self {
        origin: Vec3::ZERO,
        direction: Vec3::ZERO,
    };

    /// Create a ray.
    #[must_use]
    pub const fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// End point of the segment.
    #[must_use]
    pub fn end(&self) -> Vec3 {
        self.origin + self.direction
    }

    /// Closest point on the segment to `point`.
    #[must_use]
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        let len_sq = self.direction.length_squared();
        if len_sq <= EPSILON * EPSILON {
            return self.origin;
        }
        let t = ((point - self.origin).dot(self.direction) / len_sq).clamp(0.0, 1.0);
        self.origin + self.direction * t
    }

    /// Slab test against a box, restricted to the segment.
    #[must_use]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;
        for axis in 0..3 {
            let origin = self.origin[axis];
            let dir = self.direction[axis];
            if dir.abs() < EPSILON {
                if origin < aabb.min[axis] || origin > aabb.max[axis] {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let mut t1 = (aabb.min[axis] - origin) * inv;
            let mut t2 = (aabb.max[axis] - origin) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return false;
            }
        }
        true
    }

    /// Check if the segment passes within the sphere.
    #[must_use]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.closest_point(sphere.center)
            .distance_squared(sphere.center)
            <= sphere.radius * sphere.radius
    }

    /// Check if two segments touch.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        segment_distance_squared(self, other) <= EPSILON * EPSILON
    }
}

/// Squared distance between the closest points of two segments.
fn segment_distance_squared(first: &Ray, second: &Ray) -> f32 {
    let d1 = first.direction;
    let d2 = second.direction;
    let r = first.origin - second.origin;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if a <= EPSILON && e <= EPSILON {
        (0.0, 0.0)
    } else if a <= EPSILON {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= EPSILON {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s = if denom.abs() > f32::EPSILON {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };

    let p1 = first.origin + d1 * s;
    let p2 = second.origin + d2 * t;
    p1.distance_squared(p2)
}

/// A shape attached to an ability for intersection testing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    /// Axis-aligned box
    Aabb(Aabb),
    /// Sphere
    Sphere(Sphere),
    /// Finite segment
    Ray(Ray),
}

impl Collider {
    /// Reference position: box and sphere centers, ray origin.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        match self {
            Self::Aabb(aabb) => aabb.center(),
            Self::Sphere(sphere) => sphere.center,
            Self::Ray(ray) => ray.origin,
        }
    }

    /// Half extents of the collider's bounding box.
    #[must_use]
    pub fn half_extents(&self) -> Vec3 {
        self.bounds().half_extents()
    }

    /// Tight axis-aligned bounds, used for broad-phase culling.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        match self {
            Self::Aabb(aabb) => *aabb,
            Self::Sphere(sphere) => Aabb::from_center(sphere.center, Vec3::splat(sphere.radius)),
            Self::Ray(ray) => Aabb::new(ray.origin, ray.end()),
        }
    }

    /// The same shape moved so its reference position is `position`.
    #[must_use]
    pub fn at(&self, position: Vec3) -> Self {
        match self {
            Self::Aabb(aabb) => Self::Aabb(aabb.at(position)),
            Self::Sphere(sphere) => Self::Sphere(Sphere::new(position, sphere.radius)),
            Self::Ray(ray) => Self::Ray(Ray::new(position, ray.direction)),
        }
    }

    /// Narrow-phase intersection test.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Aabb(a), Self::Aabb(b)) => a.intersects(b),
            (Self::Aabb(a), Self::Sphere(s)) | (Self::Sphere(s), Self::Aabb(a)) => {
                a.intersects_sphere(s.center, s.radius)
            }
            (Self::Aabb(a), Self::Ray(r)) | (Self::Ray(r), Self::Aabb(a)) => r.intersects_aabb(a),
            (Self::Sphere(a), Self::Sphere(b)) => a.intersects(b),
            (Self::Sphere(s), Self::Ray(r)) | (Self::Ray(r), Self::Sphere(s)) => {
                r.intersects_sphere(s)
            }
            (Self::Ray(a), Self::Ray(b)) => a.intersects(b),
        }
    }
}

impl From<Aabb> for Collider {
    fn from(aabb: Aabb) -> Self {
        Self::Aabb(aabb)
    }
}

impl From<Sphere> for Collider {
    fn from(sphere: Sphere) -> Self {
        Self::Sphere(sphere)
    }
}

impl From<Ray> for Collider {
    fn from(ray: Ray) -> Self {
        Self::Ray(ray)
    }
}
