//! Obstacle subsystem: obstacle sources, their registry, and the manager
//! that turns obstacle changes into surface rebuilds and cache purges.

use crate::cache::PathCache;
use crate::error::{NavError, Result};
use crate::events::SurfaceRebuilt;
use crate::heightfield::HeightField;
use crate::surface::{spawn_rebuild, NavSurface, RebuildPoll, RebuildTicket, SurfaceBuilder};
use crate::types::{AreaMask, Bounds, ObstacleId, SurfaceConfig, Vec3};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Obstacle sources
// ---------------------------------------------------------------------------

/// World placement of an obstacle: translation plus rotation about z.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Transform {
    pub position: Vec3,
    /// Radians, counter-clockwise about the z axis.
    pub rotation: f32,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: 0.0,
        }
    }

    /// Express a world-space ground point in the obstacle's local frame.
    pub fn to_local(&self, world_x: f32, world_y: f32) -> (f32, f32) {
        let dx = world_x - self.position.x;
        let dy = world_y - self.position.y;
        let (sin, cos) = (-self.rotation).sin_cos();
        (dx * cos - dy * sin, dx * sin + dy * cos)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ObstacleShape {
    /// Bounding volume of a static mesh.
    Box { half_extents: Vec3 },
    /// Terrain-like height samples.
    HeightField(Arc<HeightField>),
}

impl ObstacleShape {
    /// Radius of the footprint around the transform origin.
    pub fn footprint_radius(&self) -> f32 {
        match self {
            ObstacleShape::Box { half_extents } => {
                (half_extents.x * half_extents.x + half_extents.y * half_extents.y).sqrt()
            }
            ObstacleShape::HeightField(hf) => {
                let (w, d) = (hf.half_width(), hf.half_depth());
                (w * w + d * d).sqrt()
            }
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ObstacleShape::Box { half_extents } => {
                if half_extents.x <= 0.0 || half_extents.y <= 0.0 || half_extents.z < 0.0 {
                    return Err(NavError::InvalidObstacle(format!(
                        "box half extents must be positive, got {}",
                        half_extents
                    )));
                }
                Ok(())
            }
            ObstacleShape::HeightField(_) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: ObstacleId,
    pub shape: ObstacleShape,
    /// Area painted onto covered cells; `AreaMask::NOT_WALKABLE` blocks.
    pub area: AreaMask,
    pub transform: Transform,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds every obstacle currently contributing to the surface.
///
/// Ordered by id so rebuild snapshots are deterministic.
#[derive(Default)]
pub struct ObstacleRegistry {
    obstacles: BTreeMap<ObstacleId, Obstacle>,
}

impl ObstacleRegistry {
    pub fn insert(&mut self, obstacle: Obstacle) {
        self.obstacles.insert(obstacle.id, obstacle);
    }

    pub fn remove(&mut self, id: ObstacleId) -> Option<Obstacle> {
        self.obstacles.remove(&id)
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.get(&id)
    }

    pub fn get_mut(&mut self, id: ObstacleId) -> Option<&mut Obstacle> {
        self.obstacles.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Obstacle> {
        self.obstacles.values().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Batches obstacle changes and keeps at most one rebuild in flight.
///
/// Changes made while a rebuild runs stay in the dirty set and trigger the
/// next rebuild once the current one lands.
pub struct ObstacleManager {
    registry: ObstacleRegistry,
    next_id: u64,
    dirty: FxHashSet<ObstacleId>,
    retry_rebuild: bool,
    in_flight: Option<RebuildTicket>,
    builder: Arc<dyn SurfaceBuilder>,
    bounds: Bounds,
    background: bool,
    surface: Arc<dyn NavSurface>,
    generation: u64,
}

impl ObstacleManager {
    /// Build the initial (obstacle-free) surface synchronously.
    pub fn new(builder: Arc<dyn SurfaceBuilder>, config: &SurfaceConfig) -> Result<Self> {
        let surface = builder.build(&[], &config.bounds)?;
        Ok(Self {
            registry: ObstacleRegistry::default(),
            next_id: 1,
            dirty: FxHashSet::default(),
            retry_rebuild: false,
            in_flight: None,
            builder,
            bounds: config.bounds,
            background: config.background_rebuild,
            surface,
            generation: 0,
        })
    }

    pub fn add_obstacle(
        &mut self,
        shape: ObstacleShape,
        area: AreaMask,
        transform: Transform,
    ) -> Result<ObstacleId> {
        shape.validate()?;
        let id = ObstacleId(self.next_id);
        self.next_id += 1;
        self.registry.insert(Obstacle {
            id,
            shape,
            area,
            transform,
        });
        self.dirty.insert(id);
        debug!("Added {} (area {})", id, area);
        Ok(id)
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) -> Result<()> {
        self.registry
            .remove(id)
            .ok_or(NavError::UnknownObstacle(id))?;
        self.dirty.insert(id);
        debug!("Removed {}", id);
        Ok(())
    }

    /// Mark an obstacle as moved so the next tick schedules a rebuild.
    pub fn notify_transform_changed(&mut self, id: ObstacleId) -> Result<()> {
        if self.registry.get(id).is_none() {
            return Err(NavError::UnknownObstacle(id));
        }
        self.dirty.insert(id);
        Ok(())
    }

    pub fn set_transform(&mut self, id: ObstacleId, transform: Transform) -> Result<()> {
        let obstacle = self
            .registry
            .get_mut(id)
            .ok_or(NavError::UnknownObstacle(id))?;
        obstacle.transform = transform;
        self.notify_transform_changed(id)
    }

    pub fn get(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.registry.get(id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn surface(&self) -> &Arc<dyn NavSurface> {
        &self.surface
    }

    /// Incremented every time a rebuilt surface replaces the current one.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rebuild_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.dirty.is_empty() || self.retry_rebuild
    }

    /// Once-per-tick housekeeping: land a finished rebuild (swapping the
    /// surface and purging `cache`), then start a new rebuild if changes
    /// are pending and nothing is in flight.
    pub fn update(&mut self, cache: &PathCache) -> Option<SurfaceRebuilt> {
        let mut rebuilt = None;

        if let Some(ticket) = self.in_flight.as_mut() {
            match ticket.poll() {
                RebuildPoll::Pending => {}
                RebuildPoll::Ready(Ok(surface)) => {
                    let obstacles = ticket.obstacle_count();
                    self.in_flight = None;
                    self.surface = surface;
                    self.generation += 1;
                    let purged = cache.purge_all();
                    info!(
                        "Surface rebuilt (generation {}, {} obstacles), purged {} cached paths",
                        self.generation, obstacles, purged
                    );
                    rebuilt = Some(SurfaceRebuilt {
                        generation: self.generation,
                        obstacles,
                        purged_paths: purged,
                    });
                }
                RebuildPoll::Ready(Err(e)) => {
                    warn!("Surface rebuild failed, will retry: {}", e);
                    self.in_flight = None;
                    self.retry_rebuild = true;
                }
            }
        }

        if self.in_flight.is_none() && self.has_pending_changes() {
            let changes = self.dirty.len();
            self.dirty.clear();
            self.retry_rebuild = false;
            let snapshot = self.registry.snapshot();
            info!(
                "Starting surface rebuild ({} changes, {} obstacles)",
                changes,
                snapshot.len()
            );
            self.in_flight = Some(spawn_rebuild(
                self.builder.clone(),
                snapshot,
                self.bounds,
                self.background,
            ));
        }

        rebuilt
    }
}
