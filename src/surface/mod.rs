//! Navigable-surface query primitive.
//!
//! The engine only talks to the surface through [`NavSurface`] and
//! [`CorridorSearch`], so any geometry service that can project points,
//! cast rays and run a time-sliced corridor search can back it. The crate
//! ships [`GridSurface`], a 2.5D cell grid rasterised from the obstacle set.

mod grid;
mod search;

pub use grid::{GridSurface, GridSurfaceBuilder, NavGrid};
pub use search::GridSearch;

use crate::error::{NavError, Result, SurfaceError};
use crate::obstacle::Obstacle;
use crate::types::{AreaMask, Bounds, Vec3};
use log::warn;
use std::sync::Arc;
use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// A point snapped onto the surface, plus the opaque region that holds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceLocation {
    pub region: u64,
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Budget exhausted before the search finished.
    InProgress,
    /// A corridor to the destination exists and can be read back.
    Success,
    /// The search space was exhausted without reaching the destination.
    Failure,
}

/// Per-waypoint flags written next to the straight path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaypointFlags(pub u8);

impl WaypointFlags {
    pub const START: WaypointFlags = WaypointFlags(0b001);
    pub const END: WaypointFlags = WaypointFlags(0b010);
    pub const CORNER: WaypointFlags = WaypointFlags(0b100);

    pub fn contains(self, other: WaypointFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait NavSurface: Send + Sync {
    fn bounds(&self) -> Bounds;

    /// Snap `point` onto the nearest surface region allowed by `mask`
    /// within `extents` (half extents, z is the vertical tolerance).
    fn project(&self, point: Vec3, extents: Vec3, mask: AreaMask) -> Option<SurfaceLocation>;

    /// Start an incremental corridor search between two projected points.
    fn begin_search(
        &self,
        from: SurfaceLocation,
        to: SurfaceLocation,
        mask: AreaMask,
    ) -> Box<dyn CorridorSearch>;

    /// Convert a corridor into waypoints written to `points`/`flags`.
    /// Both buffers are cleared first; more than `max_points` waypoints is
    /// a [`SurfaceError::BufferOverflow`].
    #[allow(clippy::too_many_arguments)]
    fn straight_path(
        &self,
        corridor: &[SurfaceLocation],
        start: Vec3,
        end: Vec3,
        mask: AreaMask,
        max_points: usize,
        points: &mut Vec<Vec3>,
        flags: &mut Vec<WaypointFlags>,
    ) -> std::result::Result<(), SurfaceError>;

    /// Walk the surface in a straight line. Returns the point reached on the
    /// surface when the line gets to `to` unobstructed, `None` otherwise.
    fn ray_cast(&self, from: Vec3, to: Vec3, mask: AreaMask) -> Option<Vec3>;
}

/// A stateful, time-sliced corridor search.
pub trait CorridorSearch: Send {
    /// Expand at most `budget` search nodes.
    fn advance(&mut self, budget: u32) -> SearchStatus;

    /// Write the corridor (source first) into `out`. Fails when the search
    /// has not succeeded or when the corridor is longer than `capacity`.
    fn corridor(
        &self,
        out: &mut Vec<SurfaceLocation>,
        capacity: usize,
    ) -> std::result::Result<(), SurfaceError>;

    /// Total node expansions performed so far.
    fn iterations(&self) -> u64;
}

/// Builds a surface from the full obstacle set.
pub trait SurfaceBuilder: Send + Sync {
    fn build(&self, obstacles: &[Obstacle], bounds: &Bounds) -> Result<Arc<dyn NavSurface>>;
}

// ---------------------------------------------------------------------------
// Asynchronous rebuild
// ---------------------------------------------------------------------------

pub enum RebuildPoll {
    Pending,
    Ready(Result<Arc<dyn NavSurface>>),
}

/// Completion signal for a rebuild started by [`spawn_rebuild`].
pub struct RebuildTicket {
    rx: oneshot::Receiver<Result<Arc<dyn NavSurface>>>,
    obstacle_count: usize,
}

impl RebuildTicket {
    pub fn obstacle_count(&self) -> usize {
        self.obstacle_count
    }

    /// Non-blocking completion check.
    pub fn poll(&mut self) -> RebuildPoll {
        match self.rx.try_recv() {
            Ok(result) => RebuildPoll::Ready(result),
            Err(oneshot::error::TryRecvError::Empty) => RebuildPoll::Pending,
            Err(oneshot::error::TryRecvError::Closed) => RebuildPoll::Ready(Err(
                NavError::RebuildFailed("rebuild worker exited without a result".into()),
            )),
        }
    }
}

/// Rebuild the surface from `obstacles`, either on a named background
/// thread or inline. Either way the result is only observed through
/// [`RebuildTicket::poll`].
pub fn spawn_rebuild(
    builder: Arc<dyn SurfaceBuilder>,
    obstacles: Vec<Obstacle>,
    bounds: Bounds,
    background: bool,
) -> RebuildTicket {
    let (tx, rx) = oneshot::channel();
    let obstacle_count = obstacles.len();

    if background {
        let spawned = std::thread::Builder::new()
            .name("nav-rebuild".into())
            .spawn(move || {
                let _ = tx.send(builder.build(&obstacles, &bounds));
            });
        if let Err(e) = spawned {
            // The sender went down with the closure; the ticket reports Closed.
            warn!("Failed to spawn surface rebuild thread: {}", e);
        }
    } else {
        let _ = tx.send(builder.build(&obstacles, &bounds));
    }

    RebuildTicket { rx, obstacle_count }
}
