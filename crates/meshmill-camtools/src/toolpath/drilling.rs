//! Point drilling with optional peck cycles.

use super::{MotionPlanner, MotionSegment, PlanContext};
use crate::params::DrillingParams;
use meshmill_core::ToolpathError;
use nalgebra::Point3;
use tracing::{debug, warn};

/// Height of the retract plane above the material at the hole (mm)
pub const RETRACT_CLEARANCE: f64 = 2.0;

/// Distance above the previous peck bottom to rapid back down to (mm)
pub const PECK_RETURN_CLEARANCE: f64 = 0.5;

pub struct DrillingPlanner<'a> {
    params: &'a DrillingParams,
}

impl<'a> DrillingPlanner<'a> {
    pub fn new(params: &'a DrillingParams) -> Self {
        Self { params }
    }
}

impl MotionPlanner for DrillingPlanner<'_> {
    fn plan(&self, ctx: &PlanContext<'_>) -> Result<Vec<MotionSegment>, ToolpathError> {
        if self.params.locations.is_empty() {
            return Err(ctx.unsatisfiable("no drill locations given"));
        }

        let holes: Vec<[f64; 2]> = self
            .params
            .locations
            .iter()
            .copied()
            .filter(|&[x, y]| {
                let inside = ctx.stock.contains_xy(x, y);
                if !inside {
                    warn!(operation = ctx.label, x, y, "Drill location outside stock, skipped");
                }
                inside
            })
            .collect();
        if holes.is_empty() {
            return Err(ctx.unsatisfiable("every drill location lies outside the stock"));
        }

        let target_z = ctx.final_depth;
        let mut b = ctx.builder();
        for [x, y] in holes {
            let top = ctx.rest_top(x, y);
            if top <= target_z + 1e-9 {
                debug!(operation = ctx.label, x, y, "Hole already cleared to depth, skipped");
                continue;
            }
            let retract_z = (top + RETRACT_CLEARANCE).min(ctx.safe_z);

            b.retract();
            b.rapid_to(Point3::new(x, y, ctx.safe_z));
            b.rapid_to(Point3::new(x, y, retract_z));

            if self.params.peck_depth <= 0.0 {
                b.plunge_to(target_z);
                continue;
            }

            let mut current_z = top.min(retract_z);
            while current_z > target_z {
                current_z = (current_z - self.params.peck_depth).max(target_z);
                b.plunge_to(current_z);
                // Clear chips
                b.rapid_to(Point3::new(x, y, retract_z));
                if current_z > target_z {
                    b.rapid_to(Point3::new(x, y, current_z + PECK_RETURN_CLEARANCE));
                }
            }
        }
        Ok(b.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolpath::dropcutter::Cutter;
    use crate::toolpath::Motion;
    use meshmill_core::ToolLibrary;
    use meshmill_model::{build_stock, Mesh, Stock};

    fn setup() -> (ToolLibrary, Mesh, Stock) {
        let mesh = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 5.0));
        let stock = build_stock(&mesh.bounding_box().unwrap(), 5.0).unwrap();
        (ToolLibrary::standard(), mesh, stock)
    }

    fn plan(params: &DrillingParams) -> Result<Vec<MotionSegment>, ToolpathError> {
        let (tools, mesh, stock) = setup();
        let tool = tools.get_tool(&"Drill5".into()).unwrap();
        let ctx = PlanContext {
            label: "Holes",
            tool,
            cutter: Cutter::from_tool(tool),
            stock: &stock,
            target: &mesh,
            target_bounds: mesh.bounding_box().unwrap(),
            removal: None,
            feed_rate: 300.0,
            plunge_rate: 150.0,
            step_down: 5.0,
            safe_z: 15.0,
            final_depth: 0.0,
            sample_spacing: None,
            start: Point3::new(-5.0, -5.0, 15.0),
        };
        DrillingPlanner::new(params).plan(&ctx)
    }

    #[test]
    fn test_single_plunge_per_hole() {
        let params = DrillingParams {
            locations: vec![[2.0, 2.0], [8.0, 8.0]],
            peck_depth: 0.0,
        };
        let segs = plan(&params).unwrap();

        let plunges: Vec<_> = segs.iter().filter(|s| s.motion == Motion::Linear).collect();
        assert_eq!(plunges.len(), 2);
        for p in &plunges {
            assert_eq!(p.start.z, 12.0);
            assert_eq!(p.end.z, 0.0);
            assert_eq!(p.feed_rate, 150.0);
            assert_eq!((p.start.x, p.start.y), (p.end.x, p.end.y));
        }
        assert_eq!(segs.last().unwrap().end.z, 15.0);
    }

    #[test]
    fn test_peck_cycle() {
        let params = DrillingParams {
            locations: vec![[5.0, 5.0]],
            peck_depth: 3.0,
        };
        let segs = plan(&params).unwrap();

        let bottoms: Vec<f64> = segs
            .iter()
            .filter(|s| s.motion == Motion::Linear)
            .map(|s| s.end.z)
            .collect();
        assert_eq!(bottoms, vec![7.0, 4.0, 1.0, 0.0]);

        // Every peck is followed by a chip-clearing retract
        for (i, s) in segs.iter().enumerate() {
            if s.motion == Motion::Linear {
                assert_eq!(segs[i + 1].motion, Motion::Rapid);
                assert_eq!(segs[i + 1].end.z, 12.0);
            }
        }
        assert!(segs.iter().any(|s| s.motion == Motion::Rapid && s.end.z == 4.5));
    }

    #[test]
    fn test_no_locations_is_unsatisfiable() {
        let err = plan(&DrillingParams::default()).unwrap_err();
        assert!(matches!(err, ToolpathError::Unsatisfiable { .. }));
    }

    #[test]
    fn test_outside_locations_are_skipped() {
        let params = DrillingParams {
            locations: vec![[100.0, 100.0], [5.0, 5.0]],
            peck_depth: 0.0,
        };
        let segs = plan(&params).unwrap();
        assert!(segs.iter().all(|s| s.end.x < 50.0));

        let params = DrillingParams {
            locations: vec![[100.0, 100.0]],
            peck_depth: 0.0,
        };
        assert!(matches!(
            plan(&params).unwrap_err(),
            ToolpathError::Unsatisfiable { .. }
        ));
    }
}
