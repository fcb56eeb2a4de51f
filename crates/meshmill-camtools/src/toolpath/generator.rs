//! Toolpath generator
//!
//! Resolves an operation's tool and parameters, runs the planner for its
//! strategy and appends the motion to the job. Operations are generated
//! one at a time in declaration order; each sees the material removed by
//! the ones before it.

use super::{
    ContourPlanner, Cutter, DrillingPlanner, MotionPlanner, MotionSegment, PlanContext,
    PocketPlanner,
};
use crate::job::Job;
use crate::params::StrategyParams;
use crate::removal::DEFAULT_RESOLUTION;
use meshmill_core::{Tool, ToolLookup, ToolpathError};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Tunables shared by every operation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Surface sample spacing in mm; derived from the tool when unset
    pub sample_spacing: Option<f64>,
    /// Rest material cell size in mm
    pub removal_resolution: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            sample_spacing: None,
            removal_resolution: DEFAULT_RESOLUTION,
        }
    }
}

/// Cooperative cancellation flag, checked between operations
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of [`ToolpathGenerator::generate_all`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationReport {
    /// Label and segment count of each operation generated by this call
    pub generated: Vec<(String, usize)>,
    /// Labels still without a toolpath
    pub pending: Vec<String>,
    pub cancelled: bool,
}

/// Planned motion with the values recorded in the job span
struct Planned {
    segments: Vec<MotionSegment>,
    tool: Tool,
    spindle_speed: u32,
}

pub struct ToolpathGenerator<'a> {
    tools: &'a dyn ToolLookup,
    settings: GeneratorSettings,
}

impl<'a> ToolpathGenerator<'a> {
    pub fn new(tools: &'a dyn ToolLookup) -> Self {
        Self {
            tools,
            settings: GeneratorSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: GeneratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Plan an operation without touching the job
    pub fn plan(&self, job: &Job, label: &str) -> Result<Vec<MotionSegment>, ToolpathError> {
        self.prepare(job, label).map(|planned| planned.segments)
    }

    /// Plan an operation and append its motion to the job
    ///
    /// Returns the number of segments appended. An operation whose material
    /// was already removed appends none but is still marked generated.
    pub fn generate(&self, job: &mut Job, label: &str) -> Result<usize, ToolpathError> {
        if job.is_generated(label) {
            return Err(ToolpathError::AlreadyGenerated {
                label: label.to_string(),
            });
        }
        let planned = self.prepare(job, label)?;
        let count = planned.segments.len();
        job.append_toolpath(
            label,
            &planned.tool,
            planned.spindle_speed,
            planned.segments,
            self.settings.removal_resolution,
        );
        info!(
            operation = label,
            tool = %planned.tool.id,
            segments = count,
            "Toolpath generated"
        );
        Ok(count)
    }

    /// Generate every pending operation in declaration order
    pub fn generate_all(
        &self,
        job: &mut Job,
        cancel: &CancelToken,
    ) -> Result<GenerationReport, ToolpathError> {
        self.generate_all_with(job, cancel, |_, _| {})
    }

    /// Like [`generate_all`](Self::generate_all), reporting each finished operation
    ///
    /// The first failing operation aborts the run; operations generated
    /// before it stay in the job.
    pub fn generate_all_with<F>(
        &self,
        job: &mut Job,
        cancel: &CancelToken,
        mut progress: F,
    ) -> Result<GenerationReport, ToolpathError>
    where
        F: FnMut(&str, usize),
    {
        let mut report = GenerationReport::default();
        for label in job.pending_operations() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let count = self.generate(job, &label)?;
            progress(&label, count);
            report.generated.push((label, count));
        }
        report.pending = job.pending_operations();
        if report.cancelled {
            warn!(
                job = job.name(),
                pending = report.pending.len(),
                "Toolpath generation cancelled"
            );
        }
        Ok(report)
    }

    fn prepare(&self, job: &Job, label: &str) -> Result<Planned, ToolpathError> {
        let stock = job.stock().ok_or(ToolpathError::MissingStock)?;
        let target_bounds = job.target_bounds().ok_or(ToolpathError::MissingTarget)?;
        let op = job
            .operation(label)
            .ok_or_else(|| ToolpathError::UnknownOperation {
                label: label.to_string(),
            })?;
        if op.tool.is_empty() {
            return Err(ToolpathError::NoTool {
                label: label.to_string(),
            });
        }
        let tool = self
            .tools
            .tool(&op.tool)
            .ok_or_else(|| ToolpathError::UnknownTool {
                label: label.to_string(),
                tool: op.tool.to_string(),
            })?;

        let unsatisfiable = |reason: &str| ToolpathError::Unsatisfiable {
            label: label.to_string(),
            reason: reason.to_string(),
        };
        if !(tool.diameter > 0.0) {
            return Err(unsatisfiable("tool diameter must be positive"));
        }

        let cutting = &op.params.cutting;
        let feed_rate = cutting.feed_rate.unwrap_or(tool.params.feed_rate);
        let plunge_rate = cutting.plunge_rate.unwrap_or(feed_rate);
        let spindle_speed = cutting.spindle_speed.unwrap_or(tool.params.rpm);
        let step_down = cutting.step_down.unwrap_or(tool.params.depth_per_pass);
        if !(step_down > 0.0) {
            return Err(unsatisfiable("step down must be positive"));
        }
        let safe_z = stock.top_z() + cutting.safe_height;
        let final_depth = cutting.final_depth.unwrap_or(target_bounds.min().z);
        if final_depth >= stock.top_z() {
            return Err(unsatisfiable("final depth is at or above the stock top"));
        }

        let start = job
            .toolpath()
            .last()
            .map(|seg| seg.end)
            .unwrap_or_else(|| Point3::new(stock.origin.x, stock.origin.y, safe_z));

        let ctx = PlanContext {
            label,
            tool,
            cutter: Cutter::from_tool(tool),
            stock,
            target: job.target(),
            target_bounds,
            removal: job.removal(),
            feed_rate,
            plunge_rate,
            step_down,
            safe_z,
            final_depth,
            sample_spacing: self.settings.sample_spacing,
            start,
        };

        info!(
            operation = label,
            kind = %op.kind,
            tool = %tool.id,
            feed_rate,
            spindle_speed,
            step_down,
            final_depth,
            "Planning toolpath"
        );
        let mut segments = match &op.params.strategy {
            StrategyParams::Pocket(params) => PocketPlanner::new(params).plan(&ctx)?,
            StrategyParams::Contour(params) => ContourPlanner::new(params).plan(&ctx)?,
            StrategyParams::Drilling(params) => DrillingPlanner::new(params).plan(&ctx)?,
        };
        // Nothing left to cut; the operation still gets an (empty) span
        if !segments.iter().any(|seg| seg.motion.is_cutting()) {
            warn!(
                operation = label,
                tool = %tool.id,
                "No material left to cut, operation produces no motion"
            );
            segments.clear();
        }

        Ok(Planned {
            segments,
            tool: tool.clone(),
            spindle_speed,
        })
    }
}
