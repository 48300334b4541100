//! NavEngine – the explicit engine context.
//!
//! One tick runs four phases in a fixed order:
//!
//! 1. **Surface** – land a finished rebuild (swap surface, purge cache) and
//!    start the next one if obstacles changed.
//! 2. **Step** – every occupied slot advances once, possibly in parallel.
//! 3. **Completion** – terminal slot results are written to the cache and
//!    delivered to agents, and the slots are released.
//! 4. **Admission** – queued requests fill free slots in FIFO order; cache
//!    hits are answered without taking a slot.
//!
//! Cache and queue mutation is confined to these phases, so no phase ever
//! observes another phase half-done.

use crate::agent::{AgentPathState, PathStatus};
use crate::cache::PathCache;
use crate::error::{NavError, Result};
use crate::events::{QueryCompleted, QueryOutcome, RequestAdmitted, TickEvents};
use crate::key::SpatialKey;
use crate::obstacle::{ObstacleManager, ObstacleShape, Transform};
use crate::queue::{PathRequest, RequestQueue};
use crate::slots::{QuerySlotPool, SlotState};
use crate::surface::{GridSurfaceBuilder, NavSurface, SurfaceBuilder};
use crate::types::{
    AgentHandle, AreaMask, NavConfig, NavStats, ObstacleId, SurfaceConfig, TraversalProfile, Vec3,
};
use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct NavEngine {
    config: NavConfig,
    cache: Arc<PathCache>,
    queue: RequestQueue,
    slots: QuerySlotPool,
    obstacles: ObstacleManager,
    agents: BTreeMap<AgentHandle, AgentPathState>,
    agent_ids: FxHashMap<String, AgentHandle>,
    next_handle: u64,
    next_ticket: u64,
    tick_count: u64,
}

impl NavEngine {
    /// Engine backed by the built-in grid surface.
    pub fn new(config: NavConfig, surface: SurfaceConfig) -> Result<Self> {
        surface.validate()?;
        let builder = Arc::new(GridSurfaceBuilder::new(&surface));
        Self::with_builder(config, surface, builder)
    }

    /// Engine backed by any surface implementation.
    pub fn with_builder(
        config: NavConfig,
        surface: SurfaceConfig,
        builder: Arc<dyn SurfaceBuilder>,
    ) -> Result<Self> {
        config.validate()?;
        let obstacles = ObstacleManager::new(builder, &surface)?;
        Ok(Self {
            slots: QuerySlotPool::new(&config),
            config,
            cache: Arc::new(PathCache::new()),
            queue: RequestQueue::new(),
            obstacles,
            agents: BTreeMap::new(),
            agent_ids: FxHashMap::default(),
            next_handle: 1,
            next_ticket: 1,
            tick_count: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Agent management
    // -----------------------------------------------------------------------

    pub fn register_agent(
        &mut self,
        id: impl Into<String>,
        profile: TraversalProfile,
    ) -> Result<AgentHandle> {
        let id = id.into();
        if self.agent_ids.contains_key(&id) {
            return Err(NavError::DuplicateAgent(id));
        }
        let handle = AgentHandle(self.next_handle);
        self.next_handle += 1;
        self.agent_ids.insert(id.clone(), handle);
        self.agents
            .insert(handle, AgentPathState::new(id, handle, profile));
        Ok(handle)
    }

    /// Drop the agent immediately. A request already in a slot runs to
    /// completion and is cached, but nobody receives it.
    pub fn unregister_agent(&mut self, handle: AgentHandle) -> Result<()> {
        let agent = self
            .agents
            .remove(&handle)
            .ok_or(NavError::UnknownAgent(handle))?;
        self.agent_ids.remove(&agent.id);
        self.queue.cancel(handle);
        Ok(())
    }

    pub fn agent(&self, handle: AgentHandle) -> Option<&AgentPathState> {
        self.agents.get(&handle)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    // -----------------------------------------------------------------------
    // Path requests
    // -----------------------------------------------------------------------

    /// Ask for a path from the agent's current position to `target`.
    /// Replaces any pending request of the same agent; repeating the pending
    /// request is a no-op. A fresh cache entry answers immediately without
    /// queueing.
    pub fn request_path(&mut self, handle: AgentHandle, target: Vec3, mask: AreaMask) -> Result<()> {
        let step = self.config.key_quantization;
        let agent = self
            .agents
            .get_mut(&handle)
            .ok_or(NavError::UnknownAgent(handle))?;
        let pending = matches!(agent.status, PathStatus::Queued | PathStatus::InProgress);
        if pending && agent.target == target && agent.mask == mask {
            return Ok(());
        }
        agent.target = target;
        agent.mask = mask;

        let key = SpatialKey::new(agent.position, target, mask, step);
        if let Some(path) = self.cache.get(key) {
            self.queue.cancel(handle);
            agent.assign_path(key, path);
            debug!("{} served from cache ({})", handle, key);
            return Ok(());
        }

        self.enqueue(handle, false);
        Ok(())
    }

    /// Current status. A `Found` agent whose cache entry vanished goes back
    /// to `Queued` and is re-requested.
    pub fn poll(&mut self, handle: AgentHandle) -> Result<PathStatus> {
        self.revalidate(handle)?;
        Ok(self.agents[&handle].status)
    }

    /// Move the agent up to `delta` along its path. Never blocks; agents
    /// without a usable path stay where they are.
    pub fn advance(&mut self, handle: AgentHandle, delta: f32) -> Result<Vec3> {
        self.revalidate(handle)?;
        let tolerance = self.config.arrival_tolerance;
        let agent = self
            .agents
            .get_mut(&handle)
            .ok_or(NavError::UnknownAgent(handle))?;
        if !agent.following() {
            return Ok(agent.position);
        }
        Ok(agent.advance(delta, tolerance))
    }

    /// Host transform feed. An agent pushed further than `repath_distance`
    /// off its current segment is re-requested.
    pub fn set_agent_position(&mut self, handle: AgentHandle, position: Vec3) -> Result<()> {
        let repath = self.config.repath_distance;
        let agent = self
            .agents
            .get_mut(&handle)
            .ok_or(NavError::UnknownAgent(handle))?;
        agent.position = position;
        if agent.following() && agent.deviation() > repath {
            debug!(
                "{} deviated {:.2} from its path, re-requesting",
                handle,
                agent.deviation()
            );
            self.enqueue(handle, true);
        }
        Ok(())
    }

    /// Re-check a `Found` agent against the cache.
    fn revalidate(&mut self, handle: AgentHandle) -> Result<()> {
        let agent = self
            .agents
            .get_mut(&handle)
            .ok_or(NavError::UnknownAgent(handle))?;
        if !agent.following() {
            return Ok(());
        }
        let Some(key) = agent.key else {
            return Ok(());
        };
        // Revalidation is not a lookup; keep it out of the hit/miss stats.
        match self.cache.peek(key) {
            None => {
                debug!("{} lost its cached path ({}), re-requesting", handle, key);
                self.enqueue(handle, true);
            }
            Some(current) if !agent.is_same_path(&current) => agent.adopt_replacement(current),
            Some(_) => {}
        }
        Ok(())
    }

    fn enqueue(&mut self, handle: AgentHandle, retry: bool) {
        let Some(agent) = self.agents.get_mut(&handle) else {
            return;
        };
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        agent.mark_queued(ticket);
        self.queue.enqueue(PathRequest {
            agent: handle,
            target: agent.target,
            mask: agent.mask,
            retry,
            ticket,
            queued_at: self.tick_count,
            reported_starving: false,
        });
    }

    // -----------------------------------------------------------------------
    // Obstacles
    // -----------------------------------------------------------------------

    pub fn add_obstacle(
        &mut self,
        shape: ObstacleShape,
        area: AreaMask,
        transform: Transform,
    ) -> Result<ObstacleId> {
        self.obstacles.add_obstacle(shape, area, transform)
    }

    pub fn remove_obstacle(&mut self, id: ObstacleId) -> Result<()> {
        self.obstacles.remove_obstacle(id)
    }

    pub fn notify_transform_changed(&mut self, id: ObstacleId) -> Result<()> {
        self.obstacles.notify_transform_changed(id)
    }

    pub fn set_obstacle_transform(&mut self, id: ObstacleId, transform: Transform) -> Result<()> {
        self.obstacles.set_transform(id, transform)
    }

    pub fn obstacles(&self) -> &ObstacleManager {
        &self.obstacles
    }

    pub fn surface(&self) -> Arc<dyn NavSurface> {
        self.obstacles.surface().clone()
    }

    // -----------------------------------------------------------------------
    // Main tick
    // -----------------------------------------------------------------------

    pub fn tick(&mut self) -> TickEvents {
        self.tick_count += 1;
        let mut events = TickEvents {
            tick: self.tick_count,
            ..Default::default()
        };

        events.rebuilt = self.obstacles.update(&self.cache);

        let surface = self.obstacles.surface().clone();
        let generation = self.obstacles.generation();
        let outcomes = self.slots.step_all(&surface, generation, &self.config);

        for outcome in outcomes {
            let request = &outcome.request;
            match &outcome.path {
                Some(path) => self.cache.set(outcome.key, path.clone()),
                None => {
                    // Never let an older path mask this failure.
                    self.cache.remove(outcome.key);
                }
            }

            let delivered = match self.agents.get_mut(&request.agent) {
                Some(agent) if agent.pending_ticket == Some(request.ticket) => {
                    match &outcome.path {
                        Some(path) => agent.assign_path(outcome.key, path.clone()),
                        None => agent.mark_failed(),
                    }
                    true
                }
                _ => false,
            };

            debug!(
                "Slot {} finished {} as {:?} (restarts {}, delivered {})",
                outcome.slot, request.agent, outcome.outcome, outcome.restarts, delivered
            );
            events.completed.push(QueryCompleted {
                agent: request.agent,
                slot: Some(outcome.slot),
                key: outcome.key,
                outcome: outcome.outcome,
                waypoints: outcome.path.as_ref().map(|p| p.len()).unwrap_or(0),
                restarts: outcome.restarts,
                delivered,
            });
            self.slots.release(outcome.slot);
        }

        self.admit(&mut events);

        for (agent, waited) in self
            .queue
            .take_starving(self.tick_count, self.config.queue_wait_warn_ticks)
        {
            warn!(
                "{} has waited {} ticks for a query slot ({} queued, {} slots)",
                agent,
                waited,
                self.queue.len(),
                self.slots.capacity()
            );
        }

        events
    }

    fn admit(&mut self, events: &mut TickEvents) {
        let step = self.config.key_quantization;
        while self.slots.free_count() > 0 {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            let Some(agent) = self.agents.get_mut(&request.agent) else {
                continue;
            };
            if agent.pending_ticket != Some(request.ticket) {
                continue;
            }

            let key = SpatialKey::new(agent.position, request.target, request.mask, step);
            if let Some(path) = self.cache.get(key) {
                let waypoints = path.len();
                agent.assign_path(key, path);
                events.completed.push(QueryCompleted {
                    agent: request.agent,
                    slot: None,
                    key,
                    outcome: QueryOutcome::CacheHit,
                    waypoints,
                    restarts: 0,
                    delivered: true,
                });
                continue;
            }

            let source = agent.position;
            let waited = self.tick_count.saturating_sub(request.queued_at);
            let handle = request.agent;
            let retry = request.retry;
            match self.slots.admit(request, source, key) {
                Ok(slot) => {
                    agent.status = PathStatus::InProgress;
                    debug!("{} admitted to slot {} after {} ticks", handle, slot, waited);
                    events.admitted.push(RequestAdmitted {
                        agent: handle,
                        slot,
                        key,
                        waited_ticks: waited,
                        retry,
                    });
                }
                Err(request) => {
                    // free_count said otherwise; keep its place and stop.
                    self.queue.requeue_front(request);
                    break;
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn cache(&self) -> &Arc<PathCache> {
        &self.cache
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.states()
    }

    pub fn stats(&self) -> NavStats {
        NavStats {
            tick: self.tick_count,
            queue_depth: self.queue.len(),
            oldest_wait_ticks: self.queue.oldest_wait(self.tick_count),
            occupied_slots: self.slots.occupied_count(),
            free_slots: self.slots.free_count(),
            cache_entries: self.cache.len(),
            cache_hits: self.cache.hits(),
            cache_misses: self.cache.misses(),
            surface_generation: self.obstacles.generation(),
            rebuild_in_flight: self.obstacles.rebuild_in_flight(),
            obstacles: self.obstacles.len(),
            agents: self.agents.len(),
        }
    }
}
