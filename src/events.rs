//! Events produced by the engine tick.
//!
//! Every struct is `Serialize + Deserialize` with snake_case JSON so hosts
//! can forward them verbatim (the simulation binary logs them as JSON).

use crate::key::SpatialKey;
use crate::types::AgentHandle;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Wraps an event with the tick that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavEvent<T> {
    pub frame: u64,
    pub payload: T,
}

impl<T> NavEvent<T> {
    pub fn new(frame: u64, payload: T) -> Self {
        Self { frame, payload }
    }
}

// ---------------------------------------------------------------------------
// Query lifecycle
// ---------------------------------------------------------------------------

/// A queued request moved into a query slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestAdmitted {
    pub agent: AgentHandle,
    pub slot: usize,
    pub key: SpatialKey,
    /// Ticks spent in the queue before admission.
    pub waited_ticks: u64,
    /// Issued by the engine after a purge or deviation, not by the host.
    pub retry: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Full corridor search produced the path.
    Corridor,
    /// Corridor search failed; a direct ray produced a two-point path.
    DirectRay,
    /// Satisfied from the cache at admission without taking a slot.
    CacheHit,
    Failed,
}

/// A request reached a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCompleted {
    pub agent: AgentHandle,
    /// `None` for cache hits, which never occupy a slot.
    pub slot: Option<usize>,
    pub key: SpatialKey,
    pub outcome: QueryOutcome,
    pub waypoints: usize,
    /// Restarts caused by surface rebuilds while the query was in flight.
    pub restarts: u32,
    /// Whether the requesting agent was still waiting for this result.
    pub delivered: bool,
}

// ---------------------------------------------------------------------------
// Surface lifecycle
// ---------------------------------------------------------------------------

/// A rebuilt surface replaced the previous one and the cache was purged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceRebuilt {
    pub generation: u64,
    pub obstacles: usize,
    pub purged_paths: usize,
}

// ---------------------------------------------------------------------------
// Tick result
// ---------------------------------------------------------------------------

/// Everything that happened during one [`crate::NavEngine::tick`] call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickEvents {
    pub tick: u64,
    pub rebuilt: Option<SurfaceRebuilt>,
    pub completed: Vec<QueryCompleted>,
    pub admitted: Vec<RequestAdmitted>,
}

impl TickEvents {
    pub fn is_empty(&self) -> bool {
        self.rebuilt.is_none() && self.completed.is_empty() && self.admitted.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serialises_snake_case() {
        let json = serde_json::to_string(&QueryOutcome::DirectRay).unwrap();
        assert_eq!(json, "\"direct_ray\"");
    }

    #[test]
    fn tick_events_round_trip_through_json() {
        let events = TickEvents {
            tick: 7,
            rebuilt: Some(SurfaceRebuilt {
                generation: 2,
                obstacles: 3,
                purged_paths: 4,
            }),
            completed: vec![QueryCompleted {
                agent: AgentHandle(1),
                slot: None,
                key: SpatialKey(0xabc),
                outcome: QueryOutcome::CacheHit,
                waypoints: 2,
                restarts: 0,
                delivered: true,
            }],
            admitted: Vec::new(),
        };
        let value = serde_json::to_value(NavEvent::new(7, &events)).unwrap();
        assert_eq!(value["frame"], 7);
        assert_eq!(value["payload"]["completed"][0]["outcome"], "cache_hit");
        assert_eq!(value["payload"]["rebuilt"]["purged_paths"], 4);
    }
}
