//! Toolpath generation for job operations.
//!
//! Each operation kind has a [`MotionPlanner`]. The generator resolves the
//! operation's tool and parameters into a [`PlanContext`], dispatches on the
//! strategy and appends the result to the job.

pub mod builder;
pub mod contour;
pub mod drilling;
pub mod dropcutter;
pub mod generator;
pub mod pocket;
mod segment;

use crate::removal::RemovalMap;
use meshmill_core::{Tool, ToolpathError};
use meshmill_model::{BoundingBox, Mesh, Stock};
use nalgebra::Point3;

pub use builder::MotionBuilder;
pub use contour::ContourPlanner;
pub use drilling::DrillingPlanner;
pub use dropcutter::{Cutter, CutterShape, MeshAccel};
pub use generator::{CancelToken, GenerationReport, GeneratorSettings, ToolpathGenerator};
pub use pocket::PocketPlanner;
pub use segment::{Motion, MotionSegment};

/// Everything a planner needs, with tool defaults already resolved
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub label: &'a str,
    pub tool: &'a Tool,
    pub cutter: Cutter,
    pub stock: &'a Stock,
    pub target: &'a Mesh,
    pub target_bounds: BoundingBox,
    /// Material left by earlier operations, `None` before the first one
    pub removal: Option<&'a RemovalMap>,
    pub feed_rate: f64,
    pub plunge_rate: f64,
    pub step_down: f64,
    /// Absolute Z for rapids
    pub safe_z: f64,
    /// Absolute Z of the lowest cut
    pub final_depth: f64,
    /// Distance between surface samples, planner default when `None`
    pub sample_spacing: Option<f64>,
    /// Where the tool is when this operation begins
    pub start: Point3<f64>,
}

impl PlanContext<'_> {
    /// Top of the remaining material under a tool-sized disk at (x, y)
    pub fn rest_top(&self, x: f64, y: f64) -> f64 {
        self.removal
            .and_then(|map| map.max_height_in_disk(x, y, self.cutter.radius))
            .unwrap_or_else(|| self.stock.top_z())
    }

    pub fn unsatisfiable(&self, reason: impl Into<String>) -> ToolpathError {
        ToolpathError::Unsatisfiable {
            label: self.label.to_string(),
            reason: reason.into(),
        }
    }

    pub fn builder(&self) -> MotionBuilder {
        MotionBuilder::new(self.start, self.safe_z, self.feed_rate, self.plunge_rate)
    }
}

/// Strategy-specific motion planning
pub trait MotionPlanner {
    /// Produce connected motion starting at `ctx.start` and ending at the safe height
    fn plan(&self, ctx: &PlanContext<'_>) -> Result<Vec<MotionSegment>, ToolpathError>;
}
