//! Per-agent path state and waypoint consumption.

use crate::cache::CachedPath;
use crate::key::SpatialKey;
use crate::types::{AgentHandle, AreaMask, TraversalProfile, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PathStatus {
    Idle,
    Queued,
    InProgress,
    Found { distance: f32 },
    Failed,
}

#[derive(Debug, Clone)]
pub struct AgentPathState {
    pub id: String,
    pub handle: AgentHandle,
    pub profile: TraversalProfile,
    pub status: PathStatus,
    pub position: Vec3,
    pub target: Vec3,
    pub mask: AreaMask,
    /// Distance from the position at assignment to the final waypoint.
    pub total_distance: f32,
    /// Index of the waypoint the agent is heading to.
    pub cursor: usize,
    pub arrived: bool,
    /// Cache key of the path being followed.
    pub key: Option<SpatialKey>,
    pub(crate) path: Option<CachedPath>,
    pub(crate) pending_ticket: Option<u64>,
}

impl AgentPathState {
    pub fn new(id: String, handle: AgentHandle, profile: TraversalProfile) -> Self {
        Self {
            id,
            handle,
            status: PathStatus::Idle,
            position: profile.position,
            target: profile.position,
            mask: profile.area_mask,
            profile,
            total_distance: 0.0,
            cursor: 0,
            arrived: false,
            key: None,
            path: None,
            pending_ticket: None,
        }
    }

    pub fn waypoints(&self) -> Option<&[Vec3]> {
        self.path.as_deref()
    }

    pub(crate) fn following(&self) -> bool {
        matches!(self.status, PathStatus::Found { .. }) && !self.arrived
    }

    /// Forget the followed path and wait for `ticket` to resolve.
    pub(crate) fn mark_queued(&mut self, ticket: u64) {
        self.status = PathStatus::Queued;
        self.pending_ticket = Some(ticket);
        self.path = None;
        self.key = None;
        self.cursor = 0;
        self.arrived = false;
        self.total_distance = 0.0;
    }

    pub(crate) fn mark_failed(&mut self) {
        self.status = PathStatus::Failed;
        self.pending_ticket = None;
        self.path = None;
    }

    /// Start following `path`. The first waypoint is the (projected) source,
    /// so the agent heads straight for the second one.
    pub(crate) fn assign_path(&mut self, key: SpatialKey, path: CachedPath) {
        self.cursor = if path.len() > 1 { 1 } else { 0 };
        self.path = Some(path);
        self.key = Some(key);
        self.arrived = false;
        self.pending_ticket = None;
        self.total_distance = self.remaining_distance();
        self.status = PathStatus::Found {
            distance: self.total_distance,
        };
    }

    /// The cache now holds a different path under the same key: follow it
    /// from whichever of its waypoints is nearest.
    pub(crate) fn adopt_replacement(&mut self, path: CachedPath) {
        let nearest = path
            .iter()
            .enumerate()
            .skip(1)
            .min_by(|(_, a), (_, b)| {
                self.position
                    .distance(**a)
                    .total_cmp(&self.position.distance(**b))
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        self.cursor = nearest;
        self.path = Some(path);
        self.total_distance = self.remaining_distance();
        self.status = PathStatus::Found {
            distance: self.total_distance,
        };
    }

    pub(crate) fn is_same_path(&self, other: &CachedPath) -> bool {
        self.path
            .as_ref()
            .map(|p| Arc::ptr_eq(p, other))
            .unwrap_or(false)
    }

    /// Distance left along the path from the current position.
    pub fn remaining_distance(&self) -> f32 {
        let Some(path) = self.path.as_deref() else {
            return 0.0;
        };
        if path.is_empty() || self.cursor >= path.len() {
            return 0.0;
        }
        let mut total = self.position.distance(path[self.cursor]);
        for pair in path[self.cursor..].windows(2) {
            total += pair[0].distance(pair[1]);
        }
        total
    }

    /// Distance from the position to the segment currently being walked.
    pub fn deviation(&self) -> f32 {
        let Some(path) = self.path.as_deref() else {
            return 0.0;
        };
        match self.cursor {
            _ if path.is_empty() => 0.0,
            0 => self.position.distance(path[0]),
            c => {
                let c = c.min(path.len() - 1);
                self.position.distance_to_segment(path[c - 1], path[c])
            }
        }
    }

    /// Move up to `delta` along the path and return the new position.
    pub(crate) fn advance(&mut self, delta: f32, tolerance: f32) -> Vec3 {
        let Some(path) = self.path.clone() else {
            return self.position;
        };
        let mut remaining = delta.max(0.0);

        loop {
            self.skip_reached(&path, tolerance);
            if self.arrived || remaining <= 0.0 {
                break;
            }
            let waypoint = path[self.cursor];
            let step = remaining.min(self.position.distance(waypoint));
            self.position = self.position.move_towards(waypoint, step);
            remaining -= step;
            if step <= f32::EPSILON && remaining > 0.0 {
                // Already on the waypoint but outside tolerance (tolerance 0).
                self.skip_one(&path);
            }
        }
        self.position
    }

    /// Advance the cursor past every waypoint within `tolerance`. Reaching
    /// the last-but-one waypoint while the last is also in range jumps
    /// straight to the end.
    fn skip_reached(&mut self, path: &[Vec3], tolerance: f32) {
        if path.is_empty() {
            self.arrived = true;
            return;
        }
        let last = path.len() - 1;
        while !self.arrived && self.position.distance(path[self.cursor]) <= tolerance {
            if self.cursor + 1 == last && self.position.distance(path[last]) <= tolerance {
                self.cursor = last;
            }
            self.skip_one(path);
        }
    }

    fn skip_one(&mut self, path: &[Vec3]) {
        if self.cursor + 1 >= path.len() {
            self.arrived = true;
        } else {
            self.cursor += 1;
        }
    }
}
