//! Core navigation types shared across all modules.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

use crate::error::{NavError, Result};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// World-space position. The ground plane is x/y, `z` is height.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (other - self).length()
    }

    /// Distance ignoring height.
    pub fn distance_2d(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move `self` toward `target` by at most `max_step`.
    pub fn move_towards(self, target: Vec3, max_step: f32) -> Vec3 {
        let delta = target - self;
        let len = delta.length();
        if len <= max_step || len <= f32::EPSILON {
            target
        } else {
            self + delta * (max_step / len)
        }
    }

    /// Shortest distance from `self` to the segment `a..b`.
    pub fn distance_to_segment(self, a: Vec3, b: Vec3) -> f32 {
        let ab = b - a;
        let len_sq = ab.x * ab.x + ab.y * ab.y + ab.z * ab.z;
        if len_sq <= f32::EPSILON {
            return self.distance(a);
        }
        let ap = self - a;
        let t = ((ap.x * ab.x + ap.y * ab.y + ap.z * ab.z) / len_sq).clamp(0.0, 1.0);
        self.distance(a + ab * t)
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::fmt::Display for Vec3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// Axis-aligned world bounds on the ground plane, with a height range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains_2d(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn depth(&self) -> f32 {
        self.max.y - self.min.y
    }
}

// ---------------------------------------------------------------------------
// Area masks
// ---------------------------------------------------------------------------

/// Bit set of navigation areas. A cell is traversable by a query when the
/// cell's area intersects the query mask.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct AreaMask(pub u32);

impl AreaMask {
    pub const NOT_WALKABLE: AreaMask = AreaMask(0);
    pub const WALKABLE: AreaMask = AreaMask(1);
    pub const ALL: AreaMask = AreaMask(u32::MAX);

    pub fn allows(self, area: AreaMask) -> bool {
        self.0 & area.0 != 0
    }

    pub fn is_walkable(self) -> bool {
        self.0 != 0
    }
}

impl Default for AreaMask {
    fn default() -> Self {
        AreaMask::WALKABLE
    }
}

impl std::fmt::Display for AreaMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Engine-issued handle for a registered agent.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct AgentHandle(pub u64);

impl std::fmt::Display for AgentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Engine-issued identifier for an obstacle.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ObstacleId(pub u64);

impl std::fmt::Display for ObstacleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "obstacle#{}", self.0)
    }
}

/// Per-agent traversal settings supplied at registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraversalProfile {
    /// Default mask used when a request does not override it.
    pub area_mask: AreaMask,
    /// Starting world position of the agent.
    pub position: Vec3,
}

impl Default for TraversalProfile {
    fn default() -> Self {
        Self {
            area_mask: AreaMask::WALKABLE,
            position: Vec3::zero(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats & config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavStats {
    pub tick: u64,
    /// Logical pending requests (one per agent at most).
    pub queue_depth: usize,
    /// How long the oldest queued request has been waiting, in ticks.
    pub oldest_wait_ticks: u64,
    pub occupied_slots: usize,
    pub free_slots: usize,
    pub cache_entries: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub surface_generation: u64,
    pub rebuild_in_flight: bool,
    pub obstacles: usize,
    pub agents: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavConfig {
    /// Number of concurrent query slots (fixed for the engine lifetime).
    pub max_queries: usize,
    /// Search nodes each occupied slot may expand per tick.
    pub max_iterations: u32,
    /// Capacity of the per-slot corridor and waypoint scratch buffers.
    pub max_path_size: usize,
    /// Distance at which a waypoint counts as reached.
    pub arrival_tolerance: f32,
    /// Quantisation step applied to positions before cache keying.
    pub key_quantization: f32,
    /// Half extents used when projecting points onto the surface.
    pub projection_extents: Vec3,
    /// Off-path distance that triggers an automatic re-request.
    pub repath_distance: f32,
    /// Queue wait after which a request is reported as starving.
    pub queue_wait_warn_ticks: u64,
    /// Advance occupied slots on the rayon pool.
    pub parallel_slots: bool,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            max_queries: 8,
            max_iterations: 64,
            max_path_size: 256,
            arrival_tolerance: 0.1,
            key_quantization: 0.5,
            projection_extents: Vec3::new(1.0, 1.0, 2.0),
            repath_distance: 2.0,
            queue_wait_warn_ticks: 120,
            parallel_slots: true,
        }
    }
}

impl NavConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_queries == 0 {
            return Err(NavError::InvalidConfig("max_queries must be at least 1".into()));
        }
        if self.max_iterations == 0 {
            return Err(NavError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if self.max_path_size < 2 {
            return Err(NavError::InvalidConfig("max_path_size must be at least 2".into()));
        }
        if !(self.key_quantization > 0.0) {
            return Err(NavError::InvalidConfig("key_quantization must be positive".into()));
        }
        if self.arrival_tolerance < 0.0 {
            return Err(NavError::InvalidConfig("arrival_tolerance must not be negative".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Region covered by the navigable surface.
    pub bounds: Bounds,
    /// Width/height of a single surface cell in world units.
    pub cell_size: f32,
    /// Largest height step an agent can climb between neighbouring cells.
    pub max_climb: f32,
    /// Area painted on cells no obstacle covers.
    pub ground_area: AreaMask,
    /// Run rebuilds on a background thread instead of inline.
    pub background_rebuild: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::new(Vec3::new(0.0, 0.0, -10.0), Vec3::new(64.0, 64.0, 10.0)),
            cell_size: 0.5,
            max_climb: 0.6,
            ground_area: AreaMask::WALKABLE,
            background_rebuild: true,
        }
    }
}

impl SurfaceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.cell_size > 0.0) {
            return Err(NavError::InvalidConfig("cell_size must be positive".into()));
        }
        if self.bounds.width() <= 0.0 || self.bounds.depth() <= 0.0 {
            return Err(NavError::InvalidConfig("surface bounds are empty".into()));
        }
        // Cells are addressed with u32 indices.
        let width = (self.bounds.width() / self.cell_size).ceil() as f64;
        let depth = (self.bounds.depth() / self.cell_size).ceil() as f64;
        let cells = width * depth;
        if !(cells <= u32::MAX as f64) {
            return Err(NavError::InvalidConfig(format!(
                "surface would need {:.0} cells, at most {} are addressable",
                cells,
                u32::MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_towards_clamps_to_target() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_eq!(a.move_towards(b, 10.0), b);
        let half = a.move_towards(b, 2.5);
        assert!((half.distance(a) - 2.5).abs() < 1e-5);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let p = Vec3::new(-1.0, 1.0, 0.0);
        let d = p.distance_to_segment(Vec3::zero(), Vec3::new(4.0, 0.0, 0.0));
        assert!((d - 2f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(NavConfig::default().validate().is_ok());
        assert!(SurfaceConfig::default().validate().is_ok());
    }

    #[test]
    fn oversized_surface_rejected() {
        let cfg = SurfaceConfig {
            bounds: Bounds::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(100_000.0, 100_000.0, 1.0)),
            cell_size: 1.0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(NavError::InvalidConfig(_))));

        let fits = SurfaceConfig {
            cell_size: 2.0,
            ..cfg
        };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn zero_slots_rejected() {
        let cfg = NavConfig {
            max_queries: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(NavError::InvalidConfig(_))));
    }
}
