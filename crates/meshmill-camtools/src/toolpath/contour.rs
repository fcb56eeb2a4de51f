//! Profile milling around the model silhouette.

use super::builder::APPROACH_CLEARANCE;
use super::{MotionPlanner, MotionSegment, PlanContext};
use crate::params::ContourParams;
use cavalier_contours::polyline::{PlineSource, PlineSourceMut, PlineVertex, Polyline};
use meshmill_core::ToolpathError;
use nalgebra::Point3;
use tracing::debug;

/// One profile vertex; `bulge` describes the segment to the next vertex
#[derive(Debug, Clone, Copy, PartialEq)]
struct ProfileVertex {
    x: f64,
    y: f64,
    bulge: f64,
}

/// Closed loop around the model's XY bounding box, offset by the tool
/// radius plus the stock clearance
pub struct ContourPlanner<'a> {
    params: &'a ContourParams,
}

impl<'a> ContourPlanner<'a> {
    pub fn new(params: &'a ContourParams) -> Self {
        Self { params }
    }

    /// Offset outline; clockwise for climb milling, counter-clockwise otherwise
    fn profile(&self, ctx: &PlanContext<'_>) -> Result<Vec<ProfileVertex>, ToolpathError> {
        let offset = ctx.cutter.radius + self.params.stock_clearance;
        let (min, max) = (ctx.target_bounds.min(), ctx.target_bounds.max());

        let mut outline = Polyline::new();
        outline.add_vertex(PlineVertex::new(min.x, min.y, 0.0));
        outline.add_vertex(PlineVertex::new(max.x, min.y, 0.0));
        outline.add_vertex(PlineVertex::new(max.x, max.y, 0.0));
        outline.add_vertex(PlineVertex::new(min.x, max.y, 0.0));
        outline.set_is_closed(true);

        // Offset side depends on winding; keep whichever result grew
        let max_x = |p: &Polyline<f64>| {
            p.vertex_data
                .iter()
                .map(|v| v.x)
                .fold(f64::NEG_INFINITY, f64::max)
        };
        let grown = [-offset, offset]
            .into_iter()
            .filter_map(|d| outline.parallel_offset(d).into_iter().next())
            .max_by(|a, b| max_x(a).total_cmp(&max_x(b)))
            .filter(|p| p.vertex_data.len() >= 2)
            .ok_or_else(|| ctx.unsatisfiable("profile offset produced no outline"))?;

        let mut vertices: Vec<ProfileVertex> = grown
            .vertex_data
            .iter()
            .map(|v| ProfileVertex {
                x: v.x,
                y: v.y,
                bulge: v.bulge,
            })
            .collect();

        let ccw = signed_area(&vertices) > 0.0;
        if ccw == self.params.climb {
            vertices = reversed(&vertices);
        }
        Ok(vertices)
    }

    fn levels(ctx: &PlanContext<'_>) -> Vec<f64> {
        let top = ctx.stock.top_z();
        let floor = ctx.final_depth;
        let mut levels = Vec::new();
        let mut k = 1;
        loop {
            let z = top - k as f64 * ctx.step_down;
            if z <= floor + 1e-6 {
                break;
            }
            levels.push(z);
            k += 1;
        }
        if floor < top - 1e-6 {
            levels.push(floor);
        }
        levels
    }

    /// True when some material above `z` remains along the profile
    fn has_material(ctx: &PlanContext<'_>, loop_segments: &[MotionSegment], z: f64) -> bool {
        let step = ctx.cutter.radius.max(0.5);
        loop_segments.iter().any(|seg| {
            let n = ((seg.length() / step).ceil() as usize).max(1);
            (0..=n).any(|k| {
                let p = seg.point_at(k as f64 / n as f64);
                ctx.rest_top(p.x, p.y) > z + 1e-6
            })
        })
    }
}

impl MotionPlanner for ContourPlanner<'_> {
    fn plan(&self, ctx: &PlanContext<'_>) -> Result<Vec<MotionSegment>, ToolpathError> {
        let profile = self.profile(ctx)?;
        let template = loop_segments(&profile, 0.0, ctx.feed_rate);
        let start = Point3::new(profile[0].x, profile[0].y, 0.0);

        let mut b = ctx.builder();
        let mut previous: Option<f64> = None;
        for z in Self::levels(ctx) {
            if !Self::has_material(ctx, &template, z) {
                debug!(operation = ctx.label, level = z, "Contour level is air, skipped");
                continue;
            }
            let here = Point3::new(start.x, start.y, z);
            let pos = b.position();
            let in_place = previous.is_some()
                && (pos.x - here.x).abs() < 1e-9
                && (pos.y - here.y).abs() < 1e-9
                && pos.z > z;
            if in_place {
                b.plunge_to(z);
            } else {
                let clear = ctx.rest_top(here.x, here.y) + APPROACH_CLEARANCE;
                b.travel_to(here, clear);
            }

            for seg in loop_segments(&profile, z, ctx.feed_rate) {
                match seg.center {
                    Some(center) => b.arc_to(seg.end, center, seg.motion == super::Motion::ArcCw),
                    None => b.cut_to(seg.end),
                }
            }
            previous = Some(z);
        }
        Ok(b.finish())
    }
}

/// The closed profile as cutting segments at height `z`
fn loop_segments(profile: &[ProfileVertex], z: f64, feed_rate: f64) -> Vec<MotionSegment> {
    let n = profile.len();
    (0..n)
        .filter_map(|i| {
            let a = profile[i];
            let b = profile[(i + 1) % n];
            let start = Point3::new(a.x, a.y, z);
            let end = Point3::new(b.x, b.y, z);
            if (end - start).norm() < 1e-12 {
                return None;
            }
            Some(if a.bulge.abs() < 1e-9 {
                MotionSegment::linear(start, end, feed_rate)
            } else {
                let (cx, cy) = bulge_center(a, b);
                let motion = if a.bulge > 0.0 {
                    super::Motion::ArcCcw
                } else {
                    super::Motion::ArcCw
                };
                MotionSegment::arc(motion, start, end, Point3::new(cx, cy, z), feed_rate)
            })
        })
        .collect()
}

/// Arc centre of the bulged segment from `a` to `b`
fn bulge_center(a: ProfileVertex, b: ProfileVertex) -> (f64, f64) {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let (mx, my) = ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
    let k = (1.0 - a.bulge * a.bulge) / (4.0 * a.bulge);
    (mx - dy * k, my + dx * k)
}

fn signed_area(vertices: &[ProfileVertex]) -> f64 {
    let n = vertices.len();
    (0..n)
        .map(|i| {
            let (p, q) = (vertices[i], vertices[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

/// Same loop traversed the other way
fn reversed(vertices: &[ProfileVertex]) -> Vec<ProfileVertex> {
    let n = vertices.len();
    (0..n)
        .map(|k| {
            let v = vertices[n - 1 - k];
            let segment = (2 * n - 2 - k) % n;
            ProfileVertex {
                x: v.x,
                y: v.y,
                bulge: -vertices[segment].bulge,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::removal::RemovalMap;
    use crate::toolpath::dropcutter::Cutter;
    use crate::toolpath::Motion;
    use meshmill_core::ToolLibrary;
    use meshmill_model::{build_stock, Mesh, Stock};

    fn setup() -> (ToolLibrary, Mesh, Stock) {
        let mesh = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 5.0));
        let stock = build_stock(&mesh.bounding_box().unwrap(), 5.0).unwrap();
        (ToolLibrary::standard(), mesh, stock)
    }

    fn context<'a>(
        tools: &'a ToolLibrary,
        mesh: &'a Mesh,
        stock: &'a Stock,
        removal: Option<&'a RemovalMap>,
    ) -> PlanContext<'a> {
        let tool = tools.get_tool(&"RoughingTool".into()).unwrap();
        PlanContext {
            label: "Profile",
            tool,
            cutter: Cutter::from_tool(tool),
            stock,
            target: mesh,
            target_bounds: mesh.bounding_box().unwrap(),
            removal,
            feed_rate: 1500.0,
            plunge_rate: 750.0,
            step_down: 3.0,
            safe_z: 15.0,
            final_depth: 0.0,
            sample_spacing: None,
            start: Point3::new(-5.0, -5.0, 15.0),
        }
    }

    fn box_distance(p: &Point3<f64>) -> f64 {
        let dx = (0.0 - p.x).max(p.x - 10.0).max(0.0);
        let dy = (0.0 - p.y).max(p.y - 10.0).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    #[test]
    fn test_climb_profile_is_clockwise_with_arcs() {
        let (tools, mesh, stock) = setup();
        let params = ContourParams::default();
        let segs = ContourPlanner::new(&params)
            .plan(&context(&tools, &mesh, &stock, None))
            .unwrap();

        let cw = segs.iter().filter(|s| s.motion == Motion::ArcCw).count();
        assert_eq!(cw, 16, "four corners on each of four levels");
        assert!(!segs.iter().any(|s| s.motion == Motion::ArcCcw));
    }

    #[test]
    fn test_conventional_profile_is_counter_clockwise() {
        let (tools, mesh, stock) = setup();
        let params = ContourParams {
            climb: false,
            ..ContourParams::default()
        };
        let segs = ContourPlanner::new(&params)
            .plan(&context(&tools, &mesh, &stock, None))
            .unwrap();
        assert!(segs.iter().any(|s| s.motion == Motion::ArcCcw));
        assert!(!segs.iter().any(|s| s.motion == Motion::ArcCw));
    }

    #[test]
    fn test_profile_keeps_tool_radius_plus_clearance() {
        let (tools, mesh, stock) = setup();
        let params = ContourParams {
            stock_clearance: 0.5,
            ..ContourParams::default()
        };
        let segs = ContourPlanner::new(&params)
            .plan(&context(&tools, &mesh, &stock, None))
            .unwrap();

        for s in segs.iter().filter(|s| s.motion.is_cutting()) {
            for p in [s.start, s.end] {
                assert!((box_distance(&p) - 3.5).abs() < 1e-6, "{:?}", p);
            }
        }
        let levels: Vec<f64> = segs
            .iter()
            .filter(|s| s.motion.is_arc())
            .map(|s| s.start.z)
            .collect();
        assert_eq!(levels.first(), Some(&7.0));
        assert_eq!(levels.last(), Some(&0.0));
    }

    #[test]
    fn test_arc_centres_are_box_corners() {
        let (tools, mesh, stock) = setup();
        let params = ContourParams::default();
        let segs = ContourPlanner::new(&params)
            .plan(&context(&tools, &mesh, &stock, None))
            .unwrap();
        for s in segs.iter().filter(|s| s.motion.is_arc()) {
            let c = s.center.unwrap();
            let corner = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
                .iter()
                .any(|&(x, y)| (c.x - x).abs() < 1e-6 && (c.y - y).abs() < 1e-6);
            assert!(corner, "unexpected centre {:?}", c);
        }
    }

    #[test]
    fn test_air_levels_are_skipped() {
        let (tools, mesh, stock) = setup();
        let mut map = RemovalMap::new(&stock, 0.5);
        map.stamp(5.0, 5.0, -10.0, &Cutter::flat(100.0));
        let params = ContourParams::default();
        let segs = ContourPlanner::new(&params)
            .plan(&context(&tools, &mesh, &stock, Some(&map)))
            .unwrap();
        assert!(segs.is_empty());
    }

    #[test]
    fn test_reverse_keeps_arcs() {
        let square = vec![
            ProfileVertex { x: 0.0, y: 0.0, bulge: 0.0 },
            ProfileVertex { x: 1.0, y: 0.0, bulge: 0.5 },
            ProfileVertex { x: 2.0, y: 1.0, bulge: 0.0 },
        ];
        let rev = reversed(&square);
        assert_eq!((rev[0].x, rev[0].y), (2.0, 1.0));
        // Arc from (1,0) to (2,1) becomes the arc from (2,1) to (1,0)
        assert_eq!(rev[0].bulge, -0.5);
        assert_eq!(rev[1].bulge, 0.0);
        assert!((signed_area(&square) + signed_area(&rev)).abs() < 1e-12);
    }
}
