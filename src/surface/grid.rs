//! Grid-backed navigable surface.
//!
//! The surface is a row-major grid of cells over the configured bounds.
//! Each cell has an area (0 = blocked) and a surface height. Obstacles are
//! rasterised by cell centre: height fields first, then boxes, each in
//! ascending id order, later obstacles overwriting earlier ones.

use super::search::GridSearch;
use super::{CorridorSearch, NavSurface, SurfaceBuilder, SurfaceLocation, WaypointFlags};
use crate::error::{Result, SurfaceError};
use crate::obstacle::{Obstacle, ObstacleShape};
use crate::types::{AreaMask, Bounds, SurfaceConfig, Vec3};
use log::debug;
use smallvec::SmallVec;
use std::sync::Arc;

const SQRT_2: f32 = std::f32::consts::SQRT_2;

// ---------------------------------------------------------------------------
// Grid data
// ---------------------------------------------------------------------------

pub struct NavGrid {
    pub bounds: Bounds,
    pub width: usize,
    pub depth: usize,
    pub cell_size: f32,
    pub max_climb: f32,
    areas: Vec<AreaMask>,
    heights: Vec<f32>,
}

impl NavGrid {
    fn new(bounds: Bounds, cell_size: f32, max_climb: f32, ground: AreaMask) -> Self {
        let width = ((bounds.width() / cell_size).ceil() as usize).max(1);
        let depth = ((bounds.depth() / cell_size).ceil() as usize).max(1);
        Self {
            bounds,
            width,
            depth,
            cell_size,
            max_climb,
            areas: vec![ground; width * depth],
            heights: vec![0.0; width * depth],
        }
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    #[inline]
    pub fn index(&self, cx: usize, cy: usize) -> u32 {
        (cy * self.width + cx) as u32
    }

    #[inline]
    pub fn coords(&self, idx: u32) -> (usize, usize) {
        let idx = idx as usize;
        (idx % self.width, idx / self.width)
    }

    /// Cell containing a ground point, `None` outside the grid.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let gx = (x - self.bounds.min.x) / self.cell_size;
        let gy = (y - self.bounds.min.y) / self.cell_size;
        if gx < 0.0 || gy < 0.0 {
            return None;
        }
        let (cx, cy) = (gx.floor() as usize, gy.floor() as usize);
        if cx >= self.width || cy >= self.depth {
            return None;
        }
        Some((cx, cy))
    }

    pub fn area(&self, idx: u32) -> AreaMask {
        self.areas[idx as usize]
    }

    pub fn height(&self, idx: u32) -> f32 {
        self.heights[idx as usize]
    }

    pub fn passable(&self, idx: u32, mask: AreaMask) -> bool {
        mask.allows(self.areas[idx as usize])
    }

    /// Surface point at the centre of a cell.
    pub fn center(&self, idx: u32) -> Vec3 {
        let (cx, cy) = self.coords(idx);
        Vec3::new(
            self.bounds.min.x + (cx as f32 + 0.5) * self.cell_size,
            self.bounds.min.y + (cy as f32 + 0.5) * self.cell_size,
            self.heights[idx as usize],
        )
    }

    fn can_step(&self, from: u32, to: u32) -> bool {
        (self.heights[from as usize] - self.heights[to as usize]).abs() <= self.max_climb
    }

    /// Traversable 8-neighbours of `idx` with their step costs. Diagonals
    /// require both adjacent orthogonal cells to be passable.
    pub fn neighbors(&self, idx: u32, mask: AreaMask) -> SmallVec<[(u32, f32); 8]> {
        let (cx, cy) = self.coords(idx);
        let (cx, cy) = (cx as i64, cy as i64);
        let mut out = SmallVec::new();

        let open = |x: i64, y: i64| -> Option<u32> {
            if x < 0 || y < 0 || x >= self.width as i64 || y >= self.depth as i64 {
                return None;
            }
            let n = self.index(x as usize, y as usize);
            (self.passable(n, mask) && self.can_step(idx, n)).then_some(n)
        };

        for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
            if let Some(n) = open(cx + dx, cy + dy) {
                out.push((n, self.step_cost(idx, n, 1.0)));
            }
        }
        for (dx, dy) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
            if open(cx + dx, cy).is_none() || open(cx, cy + dy).is_none() {
                continue;
            }
            if let Some(n) = open(cx + dx, cy + dy) {
                out.push((n, self.step_cost(idx, n, SQRT_2)));
            }
        }
        out
    }

    fn step_cost(&self, from: u32, to: u32, planar: f32) -> f32 {
        let run = planar * self.cell_size;
        let rise = self.heights[to as usize] - self.heights[from as usize];
        (run * run + rise * rise).sqrt()
    }

    /// Admissible octile distance between two cells.
    pub fn heuristic(&self, from: u32, to: u32) -> f32 {
        let (ax, ay) = self.coords(from);
        let (bx, by) = self.coords(to);
        let dx = ax.abs_diff(bx) as f32;
        let dy = ay.abs_diff(by) as f32;
        let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
        (hi - lo + lo * SQRT_2) * self.cell_size
    }

    /// True when a straight line between two ground points stays on cells
    /// passable under `mask` without an unclimbable step. Crossing a cell
    /// corner also requires both cells sharing that corner to be passable.
    pub fn line_clear(&self, from: Vec3, to: Vec3, mask: AreaMask) -> bool {
        let Some((sx, sy)) = self.cell_at(from.x, from.y) else {
            return false;
        };
        let start = self.index(sx, sy);
        if !self.passable(start, mask) {
            return false;
        }

        let dist = from.distance_2d(to);
        let samples = ((dist / (self.cell_size * 0.25)).ceil() as usize).max(1);
        let mut prev = (sx, sy);

        for s in 1..=samples {
            let t = s as f32 / samples as f32;
            let x = from.x + (to.x - from.x) * t;
            let y = from.y + (to.y - from.y) * t;
            let Some(cell) = self.cell_at(x, y) else {
                return false;
            };
            if cell == prev {
                continue;
            }
            let prev_idx = self.index(prev.0, prev.1);
            let idx = self.index(cell.0, cell.1);
            if !self.passable(idx, mask) || !self.can_step(prev_idx, idx) {
                return false;
            }
            if cell.0 != prev.0 && cell.1 != prev.1 {
                let side_a = self.index(cell.0, prev.1);
                let side_b = self.index(prev.0, cell.1);
                if !self.passable(side_a, mask) || !self.passable(side_b, mask) {
                    return false;
                }
            }
            prev = cell;
        }
        true
    }

    fn paint(&mut self, obstacle: &Obstacle) {
        let t = &obstacle.transform;
        let r = obstacle.shape.footprint_radius();
        let lo = self.clamped_cell(t.position.x - r, t.position.y - r);
        let hi = self.clamped_cell(t.position.x + r, t.position.y + r);

        for cy in lo.1..=hi.1 {
            for cx in lo.0..=hi.0 {
                let idx = self.index(cx, cy);
                let c = self.center(idx);
                let (lx, ly) = t.to_local(c.x, c.y);
                let i = idx as usize;
                match &obstacle.shape {
                    ObstacleShape::Box { half_extents } => {
                        if lx.abs() > half_extents.x || ly.abs() > half_extents.y {
                            continue;
                        }
                        self.areas[i] = obstacle.area;
                        if obstacle.area.is_walkable() {
                            self.heights[i] = t.position.z + half_extents.z;
                        }
                    }
                    ObstacleShape::HeightField(hf) => {
                        let Some(h) = hf.height_at(lx, ly) else {
                            continue;
                        };
                        self.areas[i] = obstacle.area;
                        self.heights[i] = t.position.z + h;
                    }
                }
            }
        }
    }

    fn clamped_cell(&self, x: f32, y: f32) -> (usize, usize) {
        let gx = ((x - self.bounds.min.x) / self.cell_size).floor();
        let gy = ((y - self.bounds.min.y) / self.cell_size).floor();
        (
            (gx.max(0.0) as usize).min(self.width - 1),
            (gy.max(0.0) as usize).min(self.depth - 1),
        )
    }
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

pub struct GridSurface {
    grid: Arc<NavGrid>,
}

impl GridSurface {
    pub fn grid(&self) -> &NavGrid {
        &self.grid
    }

    pub fn height_at(&self, point: Vec3) -> Option<f32> {
        self.grid
            .cell_at(point.x, point.y)
            .map(|(cx, cy)| self.grid.height(self.grid.index(cx, cy)))
    }
}

impl NavSurface for GridSurface {
    fn bounds(&self) -> Bounds {
        self.grid.bounds
    }

    fn project(&self, point: Vec3, extents: Vec3, mask: AreaMask) -> Option<SurfaceLocation> {
        let g = &self.grid;
        let lo = g.clamped_cell(point.x - extents.x, point.y - extents.y);
        let hi = g.clamped_cell(point.x + extents.x, point.y + extents.y);

        let mut best: Option<(f32, SurfaceLocation)> = None;
        for cy in lo.1..=hi.1 {
            for cx in lo.0..=hi.0 {
                let idx = g.index(cx, cy);
                if !g.passable(idx, mask) {
                    continue;
                }
                let h = g.height(idx);
                if (h - point.z).abs() > extents.z {
                    continue;
                }
                // Closest point of the cell to the query point.
                let min_x = g.bounds.min.x + cx as f32 * g.cell_size;
                let min_y = g.bounds.min.y + cy as f32 * g.cell_size;
                let px = point.x.clamp(min_x, min_x + g.cell_size);
                let py = point.y.clamp(min_y, min_y + g.cell_size);
                let dx = (px - point.x).abs();
                let dy = (py - point.y).abs();
                if dx > extents.x || dy > extents.y {
                    continue;
                }
                let d = dx * dx + dy * dy;
                if best.as_ref().map(|(bd, _)| d < *bd).unwrap_or(true) {
                    best = Some((
                        d,
                        SurfaceLocation {
                            region: idx as u64,
                            position: Vec3::new(px, py, h),
                        },
                    ));
                }
            }
        }
        best.map(|(_, loc)| loc)
    }

    fn begin_search(
        &self,
        from: SurfaceLocation,
        to: SurfaceLocation,
        mask: AreaMask,
    ) -> Box<dyn CorridorSearch> {
        Box::new(GridSearch::new(
            self.grid.clone(),
            from.region as u32,
            to.region as u32,
            mask,
        ))
    }

    fn straight_path(
        &self,
        corridor: &[SurfaceLocation],
        start: Vec3,
        end: Vec3,
        mask: AreaMask,
        max_points: usize,
        points: &mut Vec<Vec3>,
        flags: &mut Vec<WaypointFlags>,
    ) -> std::result::Result<(), SurfaceError> {
        points.clear();
        flags.clear();
        if corridor.is_empty() {
            return Err(SurfaceError::InvalidLocation);
        }

        let g = &self.grid;
        let mut push = |p: Vec3, f: WaypointFlags| {
            if points.len() >= max_points {
                return Err(SurfaceError::BufferOverflow {
                    needed: points.len() + 1,
                    capacity: max_points,
                });
            }
            points.push(p);
            flags.push(f);
            Ok(())
        };

        push(start, WaypointFlags::START)?;
        let last = corridor.len() - 1;
        let mut anchor = start;
        let mut anchor_i = 0;

        loop {
            if anchor_i == last || g.line_clear(anchor, end, mask) {
                push(end, WaypointFlags::END)?;
                return Ok(());
            }
            // Furthest corridor cell still visible from the anchor.
            let mut next = anchor_i + 1;
            for k in (anchor_i + 1..last).rev() {
                if g.line_clear(anchor, corridor[k].position, mask) {
                    next = k;
                    break;
                }
            }
            anchor = corridor[next].position;
            anchor_i = next;
            push(anchor, WaypointFlags::CORNER)?;
        }
    }

    fn ray_cast(&self, from: Vec3, to: Vec3, mask: AreaMask) -> Option<Vec3> {
        let g = &self.grid;
        let (cx, cy) = g.cell_at(to.x, to.y)?;
        let end = g.index(cx, cy);
        if !g.passable(end, mask) || !g.line_clear(from, to, mask) {
            return None;
        }
        Some(Vec3::new(to.x, to.y, g.height(end)))
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct GridSurfaceBuilder {
    cell_size: f32,
    max_climb: f32,
    ground_area: AreaMask,
}

impl GridSurfaceBuilder {
    pub fn new(config: &SurfaceConfig) -> Self {
        Self {
            cell_size: config.cell_size,
            max_climb: config.max_climb,
            ground_area: config.ground_area,
        }
    }

    /// Rasterise the obstacle set into a concrete grid surface.
    pub fn build_grid(&self, obstacles: &[Obstacle], bounds: &Bounds) -> GridSurface {
        let mut grid = NavGrid::new(*bounds, self.cell_size, self.max_climb, self.ground_area);

        let mut ordered: Vec<&Obstacle> = obstacles.iter().collect();
        ordered.sort_by_key(|o| {
            let kind = match o.shape {
                ObstacleShape::HeightField(_) => 0u8,
                ObstacleShape::Box { .. } => 1u8,
            };
            (kind, o.id)
        });
        for obstacle in ordered {
            grid.paint(obstacle);
        }

        debug!(
            "Built {}x{} surface from {} obstacles",
            grid.width,
            grid.depth,
            obstacles.len()
        );
        GridSurface {
            grid: Arc::new(grid),
        }
    }
}

impl SurfaceBuilder for GridSurfaceBuilder {
    fn build(&self, obstacles: &[Obstacle], bounds: &Bounds) -> Result<Arc<dyn NavSurface>> {
        Ok(Arc::new(self.build_grid(obstacles, bounds)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obstacle::Transform;
    use crate::types::ObstacleId;

    fn builder() -> GridSurfaceBuilder {
        GridSurfaceBuilder {
            cell_size: 1.0,
            max_climb: 0.5,
            ground_area: AreaMask::WALKABLE,
        }
    }

    fn bounds() -> Bounds {
        Bounds::new(Vec3::new(0.0, 0.0, -5.0), Vec3::new(10.0, 10.0, 5.0))
    }

    fn wall(id: u64, x: f32) -> Obstacle {
        Obstacle {
            id: ObstacleId(id),
            shape: ObstacleShape::Box {
                half_extents: Vec3::new(0.5, 5.0, 1.0),
            },
            area: AreaMask::NOT_WALKABLE,
            transform: Transform::at(Vec3::new(x, 5.0, 0.0)),
        }
    }

    #[test]
    fn diagonal_blocked_by_corner() {
        let s = builder().build_grid(&[wall(1, 5.5)], &bounds());
        let g = s.grid();
        let idx = g.index(4, 4);
        let ns = g.neighbors(idx, AreaMask::WALKABLE);
        assert!(ns.iter().all(|(n, _)| g.coords(*n).0 != 5));
    }

    #[test]
    fn later_obstacle_overwrites_earlier() {
        let platform = Obstacle {
            id: ObstacleId(2),
            shape: ObstacleShape::Box {
                half_extents: Vec3::new(0.5, 0.5, 0.25),
            },
            area: AreaMask::WALKABLE,
            transform: Transform::at(Vec3::new(5.5, 5.5, 0.0)),
        };
        let s = builder().build_grid(&[platform, wall(1, 5.5)], &bounds());
        let g = s.grid();
        assert!(g.area(g.index(5, 5)).is_walkable());
        assert!((g.height(g.index(5, 5)) - 0.25).abs() < 1e-6);
        assert!(!g.area(g.index(5, 4)).is_walkable());
    }

    #[test]
    fn line_clear_detects_wall() {
        let s = builder().build_grid(&[wall(1, 5.5)], &bounds());
        let g = s.grid();
        assert!(!g.line_clear(Vec3::new(1.5, 1.5, 0.0), Vec3::new(8.5, 1.5, 0.0), AreaMask::WALKABLE));
        assert!(g.line_clear(Vec3::new(1.5, 1.5, 0.0), Vec3::new(1.5, 8.5, 0.0), AreaMask::WALKABLE));
    }
}
