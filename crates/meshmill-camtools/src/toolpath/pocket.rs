//! Z-level pocket clearing.
//!
//! The planning region is sampled into a height field of the lowest tool tip
//! Z the surface allows (offset by the stock clearance) and a second field
//! of the material still standing. The pocket steps down through Z levels;
//! at each level every sample whose limit is at or below the level and that
//! still has material above it is clearable, and the fill pattern covers
//! those samples.

use super::builder::{simplify_collinear, MotionBuilder, APPROACH_CLEARANCE};
use super::dropcutter::{HeightField, MeshAccel};
use super::{MotionPlanner, MotionSegment, PlanContext};
use crate::params::{PocketParams, PocketStrategy, StockMode};
use meshmill_core::ToolpathError;
use nalgebra::Point3;
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest distance between surface samples (mm)
pub const MIN_SAMPLE_SPACING: f64 = 0.25;

const LEVEL_EPS: f64 = 1e-3;

/// Radial engagement of a tool of `radius` at `angle_deg` of arc contact
pub fn engagement_stepover(radius: f64, angle_deg: f64) -> f64 {
    radius * (1.0 - angle_deg.to_radians().cos())
}

/// Sampled floor limit and rest material over the planning region
struct Surface {
    limit: HeightField,
    rest: HeightField,
}

impl Surface {
    fn sample(ctx: &PlanContext<'_>, region: [f64; 4], spacing: f64, clearance: f64) -> Self {
        let accel = MeshAccel::new(ctx.target);
        let probe = ctx.cutter.inflated(clearance);
        let floor = ctx.final_depth + clearance;
        let mut limit = HeightField::new(region, spacing, floor);
        let mut rest = HeightField::new(region, spacing, ctx.stock.top_z());

        for iy in 0..limit.ny {
            for ix in 0..limit.nx {
                let (x, y) = limit.xy_at(ix, iy);
                if let Some(z) = probe.drop(&accel, x, y) {
                    limit.set(ix, iy, (z + clearance).max(floor));
                }
                rest.set(ix, iy, ctx.rest_top(x, y));
            }
        }
        Self { limit, rest }
    }

    /// Clearable samples at level `z`
    fn mask(&self, z: f64) -> Vec<bool> {
        self.limit
            .heights
            .iter()
            .zip(&self.rest.heights)
            .map(|(&limit, &rest)| limit <= z + 1e-9 && rest > z + 1e-6)
            .collect()
    }

    /// Regular step-downs from `top`, plateau heights and the lowest limit
    fn levels(&self, top: f64, step: f64) -> Vec<f64> {
        let lowest = self
            .limit
            .heights
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
        if !(lowest < top - LEVEL_EPS) {
            return Vec::new();
        }

        let mut levels = Vec::new();
        let mut k = 1;
        loop {
            let z = top - k as f64 * step;
            if z <= lowest + LEVEL_EPS {
                break;
            }
            levels.push(z);
            k += 1;
        }

        // Flat areas of the limit get their own level so they are cut exactly
        let min_count = (self.limit.len() / 100).max(4);
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &h in &self.limit.heights {
            *counts.entry((h * 100.0 - 1e-6).ceil() as i64).or_default() += 1;
        }
        for (q, n) in counts {
            let z = q as f64 / 100.0;
            if n >= min_count && z < top - LEVEL_EPS && z > lowest {
                levels.push(z);
            }
        }

        levels.push(lowest);
        levels.sort_by(|a, b| b.total_cmp(a));
        levels.dedup_by(|a, b| (*a - *b).abs() < LEVEL_EPS);
        levels
    }

    /// Rest material height at the sample nearest (x, y)
    fn rest_at(&self, x: f64, y: f64) -> f64 {
        self.rest
            .nearest(x, y)
            .map(|(ix, iy)| self.rest.get(ix, iy))
            .unwrap_or(f64::INFINITY)
    }

    /// True when every sample along the XY segment is clearable
    fn segment_in_mask(&self, mask: &[bool], a: Point3<f64>, b: Point3<f64>, spacing: f64) -> bool {
        let len = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
        let n = ((len / (spacing * 0.5)).ceil() as usize).max(1);
        (0..=n).all(|k| {
            let t = k as f64 / n as f64;
            let x = a.x + (b.x - a.x) * t;
            let y = a.y + (b.y - a.y) * t;
            self.limit
                .nearest(x, y)
                .is_some_and(|(ix, iy)| mask[iy * self.limit.nx + ix])
        })
    }
}

/// Area clearing over the stock or the model's bounding box
pub struct PocketPlanner<'a> {
    params: &'a PocketParams,
}

impl<'a> PocketPlanner<'a> {
    pub fn new(params: &'a PocketParams) -> Self {
        Self { params }
    }

    /// Stepover in mm
    fn stepover(&self, ctx: &PlanContext<'_>) -> f64 {
        let percent = self
            .params
            .step_over
            .unwrap_or(ctx.tool.params.stepover_percent);
        2.0 * ctx.cutter.radius * percent / 100.0
    }

    /// Tool-centre bounds as [min_x, min_y, max_x, max_y]
    fn region(&self, ctx: &PlanContext<'_>) -> Result<[f64; 4], ToolpathError> {
        let stock = ctx.stock.bounds();
        let (smin, smax) = (stock.min(), stock.max());
        let region = match self.params.stock_mode {
            StockMode::Stock => [smin.x, smin.y, smax.x, smax.y],
            StockMode::BoundingBox => {
                let grow = 2.0 * ctx.cutter.radius + self.params.stock_clearance;
                let (mmin, mmax) = (ctx.target_bounds.min(), ctx.target_bounds.max());
                [
                    (mmin.x - grow).max(smin.x),
                    (mmin.y - grow).max(smin.y),
                    (mmax.x + grow).min(smax.x),
                    (mmax.y + grow).min(smax.y),
                ]
            }
        };
        if region[0] > region[2] || region[1] > region[3] {
            return Err(ctx.unsatisfiable("pocket region is empty"));
        }
        Ok(region)
    }

    fn zigzag_passes(&self, field: &HeightField, mask: &[bool], z: f64, stepover: f64) -> Vec<Vec<Point3<f64>>> {
        let angle = self.params.raster_angle.rem_euclid(180.0);
        let along_x = angle <= 45.0 || angle >= 135.0;
        let (n_rows, n_cols, pitch) = if along_x {
            (field.ny, field.nx, field.dy())
        } else {
            (field.nx, field.ny, field.dx())
        };
        let cell = |row: usize, col: usize| if along_x { (col, row) } else { (row, col) };

        let row_step = if pitch > 0.0 {
            ((stepover / pitch).floor() as usize).max(1)
        } else {
            1
        };
        let mut rows: Vec<usize> = (0..n_rows).step_by(row_step).collect();
        if rows.last() != Some(&(n_rows - 1)) {
            rows.push(n_rows - 1);
        }

        let mut passes = Vec::new();
        let mut forward = true;
        for row in rows {
            let cells: Vec<(usize, usize)> = (0..n_cols).map(|col| cell(row, col)).collect();
            let mut runs = masked_runs(field, mask, &cells);
            if runs.is_empty() {
                continue;
            }
            if !forward {
                runs.reverse();
                for run in &mut runs {
                    run.reverse();
                }
            }
            for run in runs {
                passes.push(to_points(field, &run, z));
            }
            forward = !forward;
        }
        passes
    }

    /// Rectangular rings inset by `pitch`, outermost first
    fn ring_passes(&self, field: &HeightField, mask: &[bool], z: f64, pitch: f64) -> Vec<Vec<Point3<f64>>> {
        let inset = |d: f64| if d > 0.0 { ((pitch / d).round() as isize).max(1) } else { 1 };
        let (kx, ky) = (inset(field.dx()), inset(field.dy()));
        let (nx, ny) = (field.nx as isize, field.ny as isize);

        let mut passes = Vec::new();
        let mut k = 0;
        loop {
            let (x0, x1) = (k * kx, nx - 1 - k * kx);
            let (y0, y1) = (k * ky, ny - 1 - k * ky);
            if x0 > x1 || y0 > y1 {
                break;
            }
            let (x0, x1, y0, y1) = (x0 as usize, x1 as usize, y0 as usize, y1 as usize);

            if x0 == x1 || y0 == y1 {
                let cells: Vec<(usize, usize)> = (y0..=y1)
                    .flat_map(|iy| (x0..=x1).map(move |ix| (ix, iy)))
                    .collect();
                for run in masked_runs(field, mask, &cells) {
                    passes.push(to_points(field, &run, z));
                }
                break;
            }

            let ring = ring_cells(x0, x1, y0, y1);
            let flags: Vec<bool> = ring.iter().map(|&(ix, iy)| mask[iy * field.nx + ix]).collect();
            if flags.iter().all(|&m| m) {
                let mut closed = ring.clone();
                closed.push(ring[0]);
                passes.push(to_points(field, &closed, z));
            } else if let Some(start) =
                (0..ring.len()).find(|&i| flags[i] && !flags[(i + ring.len() - 1) % ring.len()])
            {
                // Rotate so no run wraps past the end
                let rotated: Vec<(usize, usize)> =
                    ring[start..].iter().chain(&ring[..start]).copied().collect();
                for run in masked_runs(field, mask, &rotated) {
                    passes.push(to_points(field, &run, z));
                }
            }
            k += 1;
        }
        passes
    }

    /// Connect passes, staying at depth when the link is short and clearable
    fn emit(
        &self,
        b: &mut MotionBuilder,
        surface: &Surface,
        mask: &[bool],
        passes: Vec<Vec<Point3<f64>>>,
        link_limit: f64,
        spacing: f64,
    ) {
        for pass in passes {
            let Some(&start) = pass.first() else {
                continue;
            };
            let pos = b.position();
            let dist = ((start.x - pos.x).powi(2) + (start.y - pos.y).powi(2)).sqrt();
            let at_depth = (pos.z - start.z).abs() < 1e-9;
            if at_depth && dist <= link_limit && surface.segment_in_mask(mask, pos, start, spacing) {
                b.cut_to(start);
            } else {
                let clear = surface.rest_at(start.x, start.y) + APPROACH_CLEARANCE;
                b.travel_to(start, clear);
            }
            for p in &pass[1..] {
                b.cut_to(*p);
            }
        }
    }
}

impl MotionPlanner for PocketPlanner<'_> {
    fn plan(&self, ctx: &PlanContext<'_>) -> Result<Vec<MotionSegment>, ToolpathError> {
        let stepover = self.stepover(ctx);
        if !(stepover > 0.0) {
            return Err(ctx.unsatisfiable("stepover must be positive"));
        }
        let region = self.region(ctx)?;
        let radius = ctx.cutter.radius;
        let spacing = ctx
            .sample_spacing
            .unwrap_or_else(|| (radius / 2.0).min(stepover / 2.0))
            .max(MIN_SAMPLE_SPACING);

        let surface = Surface::sample(ctx, region, spacing, self.params.stock_clearance);
        let levels = surface.levels(ctx.stock.top_z(), ctx.step_down);
        debug!(
            operation = ctx.label,
            samples = surface.limit.len(),
            levels = levels.len(),
            "Pocket surface sampled"
        );

        let ring_pitch = match self.params.strategy {
            PocketStrategy::Adaptive => engagement_stepover(radius, self.params.engagement_angle)
                .min(stepover)
                .max(spacing),
            _ => stepover,
        };
        let link_limit = 3.0 * radius;

        let mut b = ctx.builder();
        for z in levels {
            let mask = surface.mask(z);
            let field = &surface.limit;
            let passes = match self.params.strategy {
                PocketStrategy::ZigZag => self.zigzag_passes(field, &mask, z, stepover),
                PocketStrategy::ContourParallel => self.ring_passes(field, &mask, z, ring_pitch),
                PocketStrategy::Adaptive => {
                    let mut rings = self.ring_passes(field, &mask, z, ring_pitch);
                    rings.reverse();
                    rings
                }
            };
            debug!(operation = ctx.label, level = z, passes = passes.len(), "Pocket level");
            self.emit(&mut b, &surface, &mask, passes, link_limit, spacing);
        }
        Ok(b.finish())
    }
}

/// Perimeter of a grid rectangle, counter-clockwise from (x0, y0)
fn ring_cells(x0: usize, x1: usize, y0: usize, y1: usize) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    cells.extend((x0..=x1).map(|ix| (ix, y0)));
    cells.extend((y0 + 1..=y1).map(|iy| (x1, iy)));
    cells.extend((x0..x1).rev().map(|ix| (ix, y1)));
    cells.extend((y0 + 1..y1).rev().map(|iy| (x0, iy)));
    cells
}

/// Maximal runs of consecutive masked cells
fn masked_runs(field: &HeightField, mask: &[bool], cells: &[(usize, usize)]) -> Vec<Vec<(usize, usize)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for &(ix, iy) in cells {
        if mask[iy * field.nx + ix] {
            current.push((ix, iy));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn to_points(field: &HeightField, cells: &[(usize, usize)], z: f64) -> Vec<Point3<f64>> {
    let points: Vec<Point3<f64>> = cells
        .iter()
        .map(|&(ix, iy)| {
            let (x, y) = field.xy_at(ix, iy);
            Point3::new(x, y, z)
        })
        .collect();
    simplify_collinear(&points)
}
