//! Time-sliced A* over a [`NavGrid`].

use super::grid::NavGrid;
use super::{CorridorSearch, SearchStatus, SurfaceLocation};
use crate::error::SurfaceError;
use crate::types::AreaMask;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq)]
struct Open {
    f: f32,
    g: f32,
    cell: u32,
}

impl Eq for Open {}

impl Ord for Open {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f; ties prefer the deeper node, then the lower index.
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| self.g.total_cmp(&other.g))
            .then_with(|| other.cell.cmp(&self.cell))
    }
}

impl PartialOrd for Open {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub struct GridSearch {
    grid: Arc<NavGrid>,
    goal: u32,
    mask: AreaMask,
    open: BinaryHeap<Open>,
    g_score: FxHashMap<u32, f32>,
    came_from: FxHashMap<u32, u32>,
    status: SearchStatus,
    iterations: u64,
}

impl GridSearch {
    pub fn new(grid: Arc<NavGrid>, start: u32, goal: u32, mask: AreaMask) -> Self {
        let mut open = BinaryHeap::new();
        let mut g_score = FxHashMap::default();
        let valid = (start as usize) < grid.len()
            && (goal as usize) < grid.len()
            && grid.passable(start, mask)
            && grid.passable(goal, mask);

        if valid {
            open.push(Open {
                f: grid.heuristic(start, goal),
                g: 0.0,
                cell: start,
            });
            g_score.insert(start, 0.0);
        }

        Self {
            grid,
            goal,
            mask,
            open,
            g_score,
            came_from: FxHashMap::default(),
            status: if valid {
                SearchStatus::InProgress
            } else {
                SearchStatus::Failure
            },
            iterations: 0,
        }
    }
}

impl CorridorSearch for GridSearch {
    fn advance(&mut self, budget: u32) -> SearchStatus {
        if self.status != SearchStatus::InProgress {
            return self.status;
        }

        for _ in 0..budget {
            let Some(Open { g, cell, .. }) = self.open.pop() else {
                self.status = SearchStatus::Failure;
                return self.status;
            };
            self.iterations += 1;

            // Stale heap entry: a cheaper route to this cell was found later.
            if g > self.g_score.get(&cell).copied().unwrap_or(f32::INFINITY) {
                continue;
            }
            if cell == self.goal {
                self.status = SearchStatus::Success;
                return self.status;
            }

            for (next, cost) in self.grid.neighbors(cell, self.mask) {
                let tentative = g + cost;
                if tentative < self.g_score.get(&next).copied().unwrap_or(f32::INFINITY) {
                    self.g_score.insert(next, tentative);
                    self.came_from.insert(next, cell);
                    self.open.push(Open {
                        f: tentative + self.grid.heuristic(next, self.goal),
                        g: tentative,
                        cell: next,
                    });
                }
            }
        }

        if self.open.is_empty() {
            self.status = SearchStatus::Failure;
        }
        self.status
    }

    fn corridor(
        &self,
        out: &mut Vec<SurfaceLocation>,
        capacity: usize,
    ) -> Result<(), SurfaceError> {
        out.clear();
        if self.status != SearchStatus::Success {
            return Err(SurfaceError::InvalidLocation);
        }

        let mut current = self.goal;
        loop {
            if out.len() >= capacity {
                let needed = out.len() + 1;
                out.clear();
                return Err(SurfaceError::BufferOverflow { needed, capacity });
            }
            out.push(SurfaceLocation {
                region: current as u64,
                position: self.grid.center(current),
            });
            match self.came_from.get(&current) {
                Some(&prev) => current = prev,
                None => break,
            }
        }
        // Walked goal → start; callers want start → goal.
        out.reverse();
        Ok(())
    }

    fn iterations(&self) -> u64 {
        self.iterations
    }
}
