//! Rest material tracking
//!
//! A 2D height map over the stock footprint recording the top of the
//! remaining material. Every generated operation lowers the cells swept by
//! its cutting moves, so later operations can skip air.

use crate::toolpath::dropcutter::Cutter;
use crate::toolpath::MotionSegment;
use meshmill_model::Stock;

/// Default cell size in mm
pub const DEFAULT_RESOLUTION: f64 = 0.5;

/// 2D height map of the material left in the stock
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalMap {
    /// Cell size in mm
    resolution: f64,
    width_px: usize,
    height_px: usize,
    /// Z of the material top per cell, row-major: y * width + x
    heights: Vec<f64>,
    /// World XY of the cell grid's minimum corner
    origin: (f64, f64),
    stock_top: f64,
}

impl RemovalMap {
    /// Create a map of untouched stock
    pub fn new(stock: &Stock, resolution: f64) -> Self {
        let resolution = if resolution.is_finite() && resolution > 0.0 {
            resolution
        } else {
            DEFAULT_RESOLUTION
        };
        let width_px = ((stock.length / resolution).ceil() as usize).max(1);
        let height_px = ((stock.width / resolution).ceil() as usize).max(1);
        let top = stock.top_z();

        Self {
            resolution,
            width_px,
            height_px,
            heights: vec![top; width_px * height_px],
            origin: (stock.origin.x, stock.origin.y),
            stock_top: top,
        }
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Get height at world coordinates, `None` outside the stock
    pub fn get_height(&self, x: f64, y: f64) -> Option<f64> {
        let (px, py) = self.world_to_pixel(x, y);
        self.index(px, py).map(|i| self.heights[i])
    }

    /// Highest remaining material under a disk, `None` when the disk misses the stock
    pub fn max_height_in_disk(&self, x: f64, y: f64, radius: f64) -> Option<f64> {
        let mut max: Option<f64> = None;
        self.for_cells_in_disk(x, y, radius, |_, _, _, h| {
            max = Some(max.map_or(h, |m: f64| m.max(h)));
        });
        max
    }

    /// Lower the cells swept by a cutting segment
    ///
    /// Rapids are ignored. Cells only ever move down.
    pub fn apply_segment(&mut self, segment: &MotionSegment, cutter: &Cutter) {
        if !segment.motion.is_cutting() {
            return;
        }
        let step = self.resolution * 0.5;
        let samples = ((segment.length() / step).ceil() as usize).max(1);
        for k in 0..=samples {
            let p = segment.point_at(k as f64 / samples as f64);
            self.stamp(p.x, p.y, p.z, cutter);
        }
    }

    /// Lower cells under the cutter with its tip at (x, y, z)
    pub fn stamp(&mut self, x: f64, y: f64, z: f64, cutter: &Cutter) {
        let (x0, y0, x1, y1) = self.pixel_window(x, y, cutter.radius);
        let r2 = cutter.radius * cutter.radius;
        for py in y0..y1 {
            for px in x0..x1 {
                let (cx, cy) = self.pixel_to_world(px, py);
                let d2 = (cx - x) * (cx - x) + (cy - y) * (cy - y);
                if d2 > r2 {
                    continue;
                }
                let bottom = z + cutter.profile_height(d2.sqrt());
                let cell = &mut self.heights[py * self.width_px + px];
                if bottom < *cell {
                    *cell = bottom;
                }
            }
        }
    }

    /// Volume removed from the original block, mm³
    pub fn removed_volume(&self) -> f64 {
        let area = self.resolution * self.resolution;
        self.heights
            .iter()
            .map(|h| (self.stock_top - h).max(0.0) * area)
            .sum()
    }

    /// Get the minimum height in the map
    pub fn min_height(&self) -> f64 {
        self.heights.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Get the maximum height in the map
    pub fn max_height(&self) -> f64 {
        self.heights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn for_cells_in_disk(&self, x: f64, y: f64, radius: f64, mut f: impl FnMut(usize, usize, f64, f64)) {
        let (x0, y0, x1, y1) = self.pixel_window(x, y, radius);
        let r2 = radius * radius;
        for py in y0..y1 {
            for px in x0..x1 {
                let (cx, cy) = self.pixel_to_world(px, py);
                let d2 = (cx - x) * (cx - x) + (cy - y) * (cy - y);
                if d2 <= r2 {
                    f(px, py, d2, self.heights[py * self.width_px + px]);
                }
            }
        }
        // Disks smaller than a cell still see the cell they sit in
        if radius < self.resolution {
            let (px, py) = self.world_to_pixel(x, y);
            if let Some(i) = self.index(px, py) {
                f(i % self.width_px, i / self.width_px, 0.0, self.heights[i]);
            }
        }
    }

    /// Half-open pixel range covering a square of half-size `radius`
    fn pixel_window(&self, x: f64, y: f64, radius: f64) -> (usize, usize, usize, usize) {
        let clamp = |v: f64, max: usize| -> usize { v.max(0.0).min(max as f64) as usize };
        let x0 = clamp(((x - radius - self.origin.0) / self.resolution).floor(), self.width_px);
        let y0 = clamp(((y - radius - self.origin.1) / self.resolution).floor(), self.height_px);
        let x1 = clamp(((x + radius - self.origin.0) / self.resolution).ceil() + 1.0, self.width_px);
        let y1 = clamp(((y + radius - self.origin.1) / self.resolution).ceil() + 1.0, self.height_px);
        (x0, y0, x1, y1)
    }

    fn world_to_pixel(&self, x: f64, y: f64) -> (isize, isize) {
        let px = ((x - self.origin.0) / self.resolution).floor() as isize;
        let py = ((y - self.origin.1) / self.resolution).floor() as isize;
        (px, py)
    }

    /// Centre of a pixel in world coordinates
    fn pixel_to_world(&self, px: usize, py: usize) -> (f64, f64) {
        let x = self.origin.0 + (px as f64 + 0.5) * self.resolution;
        let y = self.origin.1 + (py as f64 + 0.5) * self.resolution;
        (x, y)
    }

    fn index(&self, px: isize, py: isize) -> Option<usize> {
        if px < 0 || py < 0 || px >= self.width_px as isize || py >= self.height_px as isize {
            return None;
        }
        Some(py as usize * self.width_px + px as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn stock() -> Stock {
        Stock {
            origin: Point3::new(0.0, 0.0, 0.0),
            length: 20.0,
            width: 10.0,
            height: 5.0,
        }
    }

    #[test]
    fn test_new_map_is_flat_stock_top() {
        let map = RemovalMap::new(&stock(), 0.5);
        assert_eq!(map.get_height(1.0, 1.0), Some(5.0));
        assert_eq!(map.get_height(-1.0, 1.0), None);
        assert_eq!(map.removed_volume(), 0.0);
    }

    #[test]
    fn test_linear_cut_lowers_swept_cells() {
        let mut map = RemovalMap::new(&stock(), 0.5);
        let cutter = Cutter::flat(2.0);
        let seg = MotionSegment::linear(
            Point3::new(5.0, 5.0, 3.0),
            Point3::new(15.0, 5.0, 3.0),
            1000.0,
        );
        map.apply_segment(&seg, &cutter);

        assert_eq!(map.get_height(10.0, 5.0), Some(3.0));
        assert_eq!(map.get_height(10.0, 6.5), Some(3.0));
        assert_eq!(map.get_height(10.0, 9.0), Some(5.0));
        assert_eq!(map.max_height_in_disk(10.0, 5.0, 1.0), Some(3.0));
        assert_eq!(map.max_height_in_disk(10.0, 5.0, 4.0), Some(5.0));
        assert!(map.removed_volume() > 0.0);
        assert_eq!(map.min_height(), 3.0);
    }

    #[test]
    fn test_rapids_do_not_cut() {
        let mut map = RemovalMap::new(&stock(), 0.5);
        let seg = MotionSegment::rapid(Point3::new(5.0, 5.0, 0.0), Point3::new(15.0, 5.0, 0.0));
        map.apply_segment(&seg, &Cutter::flat(2.0));
        assert_eq!(map.max_height(), 5.0);
        assert_eq!(map.min_height(), 5.0);
    }

    #[test]
    fn test_ball_profile_leaves_scallop() {
        let mut map = RemovalMap::new(&stock(), 0.5);
        map.stamp(10.0, 5.0, 2.0, &Cutter::ball(2.0));
        let centre = map.get_height(10.0, 5.0).unwrap();
        let edge = map.get_height(11.6, 5.0).unwrap();
        assert!(centre < 2.2);
        assert!(edge > centre);
    }

    #[test]
    fn test_disk_outside_stock() {
        let map = RemovalMap::new(&stock(), 0.5);
        assert_eq!(map.max_height_in_disk(-50.0, -50.0, 2.0), None);
    }
}
