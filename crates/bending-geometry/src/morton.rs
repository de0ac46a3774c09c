//! Morton (Z-order) codes.
//!
//! Sorting leaves by the Morton code of their centers groups spatially close
//! leaves together, which is what lets the [`Bvh`](crate::Bvh) split a sorted
//! range in half and still get tight child bounds.

use glam::Vec3;

use crate::Aabb;

/// Resolution per axis (10 bits -> 30-bit codes).
const AXIS_RESOLUTION: f32 = 1024.0;

/// Spread the lower 10 bits of `v` so there are two zero bits between each.
#[must_use]
pub fn expand_bits(v: u32) -> u32 {
    let mut v = v & 0x3ff;
    v = (v | (v << 16)) & 0x0300_00ff;
    v = (v | (v << 8)) & 0x0300_f00f;
    v = (v | (v << 4)) & 0x030c_30c3;
    v = (v | (v << 2)) & 0x0924_9249;
    v
}

/// Encode a point whose coordinates lie in `[0, 1]`.
///
/// Values outside the unit cube are clamped.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode(normalized: Vec3) -> u32 {
    let scaled = (normalized * AXIS_RESOLUTION).clamp(Vec3::ZERO, Vec3::splat(AXIS_RESOLUTION - 1.0));
    let x = expand_bits(scaled.x as u32);
    let y = expand_bits(scaled.y as u32);
    let z = expand_bits(scaled.z as u32);
    (x << 2) | (y << 1) | z
}

/// Encode `point` relative to the `scene` bounds.
///
/// Degenerate axes (zero scene extent) map to zero.
#[must_use]
pub fn encode_in(point: Vec3, scene: &Aabb) -> u32 {
    let size = scene.size();
    let offset = point - scene.min;
    let normalized = Vec3::new(
        normalize_axis(offset.x, size.x),
        normalize_axis(offset.y, size.y),
        normalize_axis(offset.z, size.z),
    );
    encode(normalized)
}

fn normalize_axis(offset: f32, size: f32) -> f32 {
    if size > f32::EPSILON {
        offset / size
    } else {
        0.0
    }
}
