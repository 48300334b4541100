//! Query slot pool: the bounded-concurrency scheduler.
//!
//! Exactly `max_queries` slots exist for the engine lifetime, each owning
//! scratch buffers sized to `max_path_size`. A slot drives one request
//! through `Begin → Searching* → Fallback? → Complete` and gets a single
//! search advancement per tick. Slots never see each other mid-tick: each
//! step only touches its own slot, and results are handed back to the
//! engine, which applies them after every slot has stepped.

use crate::cache::CachedPath;
use crate::events::QueryOutcome;
use crate::key::SpatialKey;
use crate::queue::PathRequest;
use crate::surface::{CorridorSearch, NavSurface, SearchStatus, SurfaceLocation, WaypointFlags};
use crate::types::{NavConfig, Vec3};
use log::debug;
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Begin,
    Searching,
    Fallback,
    Complete { success: bool },
}

impl SlotState {
    pub fn is_occupied(self) -> bool {
        self != SlotState::Idle
    }
}

/// Terminal result handed from a slot to the completion phase.
pub struct SlotOutcome {
    pub slot: usize,
    pub request: PathRequest,
    pub key: SpatialKey,
    pub outcome: QueryOutcome,
    /// Waypoints source → destination; `None` on failure.
    pub path: Option<CachedPath>,
    pub restarts: u32,
}

pub struct QuerySlot {
    index: usize,
    state: SlotState,
    request: Option<PathRequest>,
    source: Vec3,
    key: SpatialKey,
    search: Option<Box<dyn CorridorSearch>>,
    generation: u64,
    start: Option<SurfaceLocation>,
    end: Option<SurfaceLocation>,
    locations: Vec<SurfaceLocation>,
    waypoints: Vec<Vec3>,
    flags: Vec<WaypointFlags>,
    restarts: u32,
}

impl QuerySlot {
    fn new(index: usize, capacity: usize) -> Self {
        Self {
            index,
            state: SlotState::Idle,
            request: None,
            source: Vec3::zero(),
            key: SpatialKey(0),
            search: None,
            generation: 0,
            start: None,
            end: None,
            locations: Vec::with_capacity(capacity),
            waypoints: Vec::with_capacity(capacity),
            flags: Vec::with_capacity(capacity),
            restarts: 0,
        }
    }

    fn admit(&mut self, request: PathRequest, source: Vec3, key: SpatialKey) {
        self.request = Some(request);
        self.source = source;
        self.key = key;
        self.state = SlotState::Begin;
    }

    /// Return the slot to the free pool with its scratch state zeroed.
    fn reset(&mut self) {
        self.state = SlotState::Idle;
        self.request = None;
        self.source = Vec3::zero();
        self.key = SpatialKey(0);
        self.search = None;
        self.generation = 0;
        self.start = None;
        self.end = None;
        self.locations.clear();
        self.waypoints.clear();
        self.flags.clear();
        self.restarts = 0;
    }

    /// Run this slot's share of one tick against the current surface.
    fn step(
        &mut self,
        surface: &Arc<dyn NavSurface>,
        generation: u64,
        config: &NavConfig,
    ) -> Option<SlotOutcome> {
        let mask = self.request.as_ref()?.mask;
        let target = self.request.as_ref()?.target;

        let in_flight = matches!(self.state, SlotState::Searching | SlotState::Fallback);
        if in_flight && self.generation != generation {
            // Surface was rebuilt under us: nothing computed so far is valid.
            debug!(
                "Slot {} restarting on surface generation {}",
                self.index, generation
            );
            self.search = None;
            self.restarts += 1;
            self.state = SlotState::Begin;
        }

        loop {
            match self.state {
                SlotState::Idle | SlotState::Complete { .. } => return None,
                SlotState::Begin => {
                    self.generation = generation;
                    self.start = surface.project(self.source, config.projection_extents, mask);
                    self.end = surface.project(target, config.projection_extents, mask);
                    match (self.start, self.end) {
                        (Some(from), Some(to)) => {
                            self.search = Some(surface.begin_search(from, to, mask));
                            self.state = SlotState::Searching;
                        }
                        _ => self.state = SlotState::Fallback,
                    }
                }
                SlotState::Searching => {
                    let status = match self.search.as_mut() {
                        Some(search) => search.advance(config.max_iterations),
                        None => SearchStatus::Failure,
                    };
                    match status {
                        SearchStatus::InProgress => return None,
                        SearchStatus::Failure => self.state = SlotState::Fallback,
                        SearchStatus::Success => {
                            if self.extract(surface.as_ref(), config) {
                                return self.complete(QueryOutcome::Corridor);
                            }
                            self.state = SlotState::Fallback;
                        }
                    }
                }
                SlotState::Fallback => {
                    let from = self.start.map(|l| l.position).unwrap_or(self.source);
                    let to = self.end.map(|l| l.position).unwrap_or(target);
                    self.waypoints.clear();
                    self.flags.clear();
                    return match surface.ray_cast(from, to, mask) {
                        Some(hit) => {
                            self.waypoints.extend_from_slice(&[from, hit]);
                            self.flags
                                .extend_from_slice(&[WaypointFlags::START, WaypointFlags::END]);
                            self.complete(QueryOutcome::DirectRay)
                        }
                        None => self.complete(QueryOutcome::Failed),
                    };
                }
            }
        }
    }

    /// Read the corridor and string-pull it into the waypoint buffer.
    /// Any overflow or primitive error is reported as `false`.
    fn extract(&mut self, surface: &dyn NavSurface, config: &NavConfig) -> bool {
        let (Some(search), Some(start), Some(end)) = (self.search.as_ref(), self.start, self.end)
        else {
            return false;
        };
        let mask = match self.request.as_ref() {
            Some(r) => r.mask,
            None => return false,
        };

        if let Err(e) = search.corridor(&mut self.locations, config.max_path_size) {
            debug!("Slot {} corridor rejected: {}", self.index, e);
            return false;
        }
        if let Err(e) = surface.straight_path(
            &self.locations,
            start.position,
            end.position,
            mask,
            config.max_path_size,
            &mut self.waypoints,
            &mut self.flags,
        ) {
            debug!("Slot {} straight path rejected: {}", self.index, e);
            return false;
        }
        true
    }

    fn complete(&mut self, outcome: QueryOutcome) -> Option<SlotOutcome> {
        let request = self.request.clone()?;
        let success = outcome != QueryOutcome::Failed;
        self.state = SlotState::Complete { success };
        let path = success.then(|| CachedPath::from(self.waypoints.as_slice()));
        Some(SlotOutcome {
            slot: self.index,
            request,
            key: self.key,
            outcome,
            path,
            restarts: self.restarts,
        })
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

pub struct QuerySlotPool {
    slots: Vec<QuerySlot>,
}

impl QuerySlotPool {
    pub fn new(config: &NavConfig) -> Self {
        Self {
            slots: (0..config.max_queries)
                .map(|i| QuerySlot::new(i, config.max_path_size))
                .collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.state.is_occupied()).count()
    }

    pub fn occupied_count(&self) -> usize {
        self.capacity() - self.free_count()
    }

    pub fn states(&self) -> Vec<SlotState> {
        self.slots.iter().map(|s| s.state).collect()
    }

    /// Place a request in the lowest free slot. Returns the slot index, or
    /// gives the request back when every slot is busy.
    pub fn admit(
        &mut self,
        request: PathRequest,
        source: Vec3,
        key: SpatialKey,
    ) -> Result<usize, PathRequest> {
        match self.slots.iter_mut().find(|s| !s.state.is_occupied()) {
            Some(slot) => {
                slot.admit(request, source, key);
                Ok(slot.index)
            }
            None => Err(request),
        }
    }

    /// Step every occupied slot once. With `parallel_slots` the steps run
    /// on the rayon pool; outcomes come back in slot order either way.
    pub fn step_all(
        &mut self,
        surface: &Arc<dyn NavSurface>,
        generation: u64,
        config: &NavConfig,
    ) -> Vec<SlotOutcome> {
        if config.parallel_slots && self.occupied_count() > 1 {
            self.slots
                .par_iter_mut()
                .filter_map(|slot| slot.step(surface, generation, config))
                .collect()
        } else {
            self.slots
                .iter_mut()
                .filter_map(|slot| slot.step(surface, generation, config))
                .collect()
        }
    }

    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.reset();
        }
    }
}
