//! Spatial cache keys.
//!
//! Source and destination are quantised on every axis with `round()` before
//! hashing, so requests whose endpoints differ by less than half a step
//! share one cache entry. The traversal mask is part of the key: two masks
//! over the same endpoints can produce different paths.

use crate::types::{AreaMask, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SpatialKey(pub u64);

impl SpatialKey {
    pub fn new(from: Vec3, to: Vec3, mask: AreaMask, step: f32) -> Self {
        let mut bytes = [0u8; 52];
        let coords = [
            quantize(from.x, step),
            quantize(from.y, step),
            quantize(from.z, step),
            quantize(to.x, step),
            quantize(to.y, step),
            quantize(to.z, step),
        ];
        for (i, c) in coords.iter().enumerate() {
            bytes[i * 8..i * 8 + 8].copy_from_slice(&c.to_le_bytes());
        }
        bytes[48..52].copy_from_slice(&mask.0.to_le_bytes());

        // md5 keeps keys identical across platforms and runs.
        let digest = md5::compute(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.0[..8]);
        SpatialKey(u64::from_le_bytes(head))
    }
}

impl std::fmt::Display for SpatialKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn quantize(v: f32, step: f32) -> i64 {
    (v / step).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_within_half_step_shares_key() {
        let a = SpatialKey::new(
            Vec3::new(1.0, 2.0, 0.0),
            Vec3::new(10.0, 10.0, 0.0),
            AreaMask::WALKABLE,
            0.5,
        );
        let b = SpatialKey::new(
            Vec3::new(1.1, 1.9, 0.05),
            Vec3::new(10.2, 9.8, 0.0),
            AreaMask::WALKABLE,
            0.5,
        );
        assert_eq!(a, b);
    }

    #[test]
    fn direction_matters() {
        let p = Vec3::new(1.0, 1.0, 0.0);
        let q = Vec3::new(5.0, 1.0, 0.0);
        assert_ne!(
            SpatialKey::new(p, q, AreaMask::WALKABLE, 0.5),
            SpatialKey::new(q, p, AreaMask::WALKABLE, 0.5)
        );
    }

    #[test]
    fn mask_is_part_of_key() {
        let p = Vec3::new(1.0, 1.0, 0.0);
        let q = Vec3::new(5.0, 1.0, 0.0);
        assert_ne!(
            SpatialKey::new(p, q, AreaMask(1), 0.5),
            SpatialKey::new(p, q, AreaMask(3), 0.5)
        );
    }
}
