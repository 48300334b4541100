//! Janet Nav Engine
//!
//! A bounded, time-sliced path-query engine. Agents ask for paths; requests
//! wait in a FIFO queue, are solved a few search iterations per tick inside a
//! fixed pool of query slots, and land in a shared path cache keyed by
//! quantized endpoints. Obstacle edits rebuild the surface off-tick and purge
//! the cache when the new surface is swapped in.
//!
//! ## Architecture
//!
//! ```text
//! NavDriver  (driver.rs)            ← tick loop, event channel [server]
//!   └── NavEngine  (engine.rs)      ← explicit context, tick phases
//!         ├── RequestQueue   (queue.rs)
//!         ├── QuerySlotPool  (slots.rs)  ─── rayon
//!         ├── PathCache      (cache.rs)  ← SpatialKey (key.rs)
//!         ├── AgentPathState (agent.rs)
//!         └── ObstacleManager (obstacle.rs)
//!               └── NavSurface  (surface/)  ← GridSurface, GridSearch
//! ```
//!
//! Everything below `NavDriver` is synchronous and usable without a runtime.

pub mod agent;
pub mod cache;
pub mod engine;
pub mod error;
pub mod events;
pub mod heightfield;
pub mod key;
pub mod obstacle;
pub mod queue;
pub mod slots;
pub mod surface;
pub mod types;

#[cfg(feature = "server")]
pub mod driver;

pub use agent::{AgentPathState, PathStatus};
pub use cache::{CachedPath, PathCache};
pub use engine::NavEngine;
pub use error::{NavError, Result, SurfaceError};
pub use events::{NavEvent, QueryCompleted, QueryOutcome, RequestAdmitted, SurfaceRebuilt, TickEvents};
pub use heightfield::HeightField;
pub use key::SpatialKey;
pub use obstacle::{Obstacle, ObstacleShape, Transform};
pub use slots::SlotState;
pub use surface::{GridSurface, GridSurfaceBuilder, NavSurface, SurfaceBuilder};
pub use types::{
    AgentHandle, AreaMask, Bounds, NavConfig, NavStats, ObstacleId, SurfaceConfig,
    TraversalProfile, Vec3,
};

#[cfg(feature = "server")]
pub use driver::{DriverConfig, NavDriver};
