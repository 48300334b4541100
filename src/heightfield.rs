//! Terrain-like obstacle source: a regular grid of height samples.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Sampled heights laid out row-major, `rows × columns`.
///
/// Local coordinates put the grid centre at the origin, so an obstacle's
/// transform position is the centre of the height field footprint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeightField {
    pub columns: usize,
    pub rows: usize,
    /// Distance between neighbouring samples in world units.
    pub cell_size: f32,
    pub heights: Vec<f32>,
}

impl HeightField {
    pub fn new(columns: usize, rows: usize, cell_size: f32, heights: Vec<f32>) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(NavError::InvalidObstacle("height field has no samples".into()));
        }
        if heights.len() != columns * rows {
            return Err(NavError::InvalidObstacle(format!(
                "height field expects {} samples, got {}",
                columns * rows,
                heights.len()
            )));
        }
        if !(cell_size > 0.0) {
            return Err(NavError::InvalidObstacle("height field cell size must be positive".into()));
        }
        Ok(Self {
            columns,
            rows,
            cell_size,
            heights,
        })
    }

    pub fn flat(columns: usize, rows: usize, cell_size: f32, height: f32) -> Result<Self> {
        Self::new(columns, rows, cell_size, vec![height; columns * rows])
    }

    /// Deterministic rolling terrain for demos and soak runs.
    pub fn generated(seed: u64, columns: usize, rows: usize, cell_size: f32, amplitude: f32) -> Result<Self> {
        let scale = 0.15;
        let s = (seed.wrapping_mul(6364136223846793005).wrapping_add(1) as f32) * 1e-9;
        let mut heights = Vec::with_capacity(columns * rows);
        for row in 0..rows {
            for col in 0..columns {
                let x = col as f32 * cell_size;
                let y = row as f32 * cell_size;
                heights.push(((x * scale + s).sin() * (y * scale + s).cos()) * amplitude);
            }
        }
        Self::new(columns, rows, cell_size, heights)
    }

    pub fn half_width(&self) -> f32 {
        self.columns as f32 * self.cell_size * 0.5
    }

    pub fn half_depth(&self) -> f32 {
        self.rows as f32 * self.cell_size * 0.5
    }

    /// Nearest-sample height at a local position, `None` outside the field.
    pub fn height_at(&self, local_x: f32, local_y: f32) -> Option<f32> {
        let gx = (local_x + self.half_width()) / self.cell_size;
        let gy = (local_y + self.half_depth()) / self.cell_size;
        if gx < 0.0 || gy < 0.0 {
            return None;
        }
        let ix = gx.floor() as usize;
        let iy = gy.floor() as usize;
        if ix >= self.columns || iy >= self.rows {
            return None;
        }
        Some(self.heights[iy * self.columns + ix])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_must_match() {
        assert!(HeightField::new(2, 2, 1.0, vec![0.0; 3]).is_err());
        assert!(HeightField::new(2, 2, 1.0, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn height_lookup_is_centred() {
        let hf = HeightField::new(2, 1, 1.0, vec![1.0, 2.0]).unwrap();
        assert_eq!(hf.height_at(-0.5, 0.0), Some(1.0));
        assert_eq!(hf.height_at(0.5, 0.0), Some(2.0));
        assert_eq!(hf.height_at(1.5, 0.0), None);
    }

    #[test]
    fn generated_is_deterministic() {
        let a = HeightField::generated(7, 8, 8, 1.0, 2.0).unwrap();
        let b = HeightField::generated(7, 8, 8, 1.0, 2.0).unwrap();
        assert_eq!(a, b);
    }
}
