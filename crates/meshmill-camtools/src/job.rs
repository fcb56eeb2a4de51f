//! Machining job
//!
//! A [`Job`] owns everything one program is made of: the target mesh, the
//! stock block, the ordered operations and the toolpath generated for them.
//! It is passed explicitly to every pipeline stage; there is no ambient
//! document.
//!
//! Lifecycle rules:
//! - stock is attached at most once,
//! - operations are only appended, labels are unique,
//! - toolpath segments are only appended, one span per generated operation.

use crate::operation::Operation;
use crate::removal::RemovalMap;
use crate::toolpath::{Cutter, MotionSegment};
use meshmill_core::{JobError, Tool, ToolId};
use meshmill_model::{BoundingBox, Mesh, Stock};
use std::ops::Range;
use tracing::{debug, info};

/// Slice of the job toolpath produced by one operation
#[derive(Debug, Clone, PartialEq)]
pub struct ToolpathSpan {
    pub label: String,
    pub tool: ToolId,
    pub tool_number: u32,
    pub spindle_speed: u32,
    /// Segment indices into [`Job::toolpath`]
    pub range: Range<usize>,
}

#[derive(Debug, Clone)]
pub struct Job {
    name: String,
    target: Mesh,
    target_bounds: Option<BoundingBox>,
    stock: Option<Stock>,
    operations: Vec<Operation>,
    toolpath: Vec<MotionSegment>,
    spans: Vec<ToolpathSpan>,
    removal: Option<RemovalMap>,
}

impl Job {
    /// Create a job for `target` with no stock and no operations
    pub fn new(name: impl Into<String>, target: Mesh) -> Self {
        let target_bounds = target.bounding_box();
        let name = name.into();
        debug!(job = %name, triangles = target.triangle_count(), "Job created");
        Self {
            name,
            target,
            target_bounds,
            stock: None,
            operations: Vec::new(),
            toolpath: Vec::new(),
            spans: Vec::new(),
            removal: None,
        }
    }

    /// Attach the stock block; it can be set only once
    pub fn attach_stock(&mut self, stock: Stock) -> Result<(), JobError> {
        if self.stock.is_some() {
            return Err(JobError::StockAlreadySet);
        }
        info!(
            job = %self.name,
            x = stock.origin.x,
            y = stock.origin.y,
            z = stock.origin.z,
            length = stock.length,
            width = stock.width,
            height = stock.height,
            "Stock attached"
        );
        self.stock = Some(stock);
        Ok(())
    }

    /// Append an operation; the job is unchanged when the label is taken
    pub fn append_operation(&mut self, operation: Operation) -> Result<&Operation, JobError> {
        if self.operation(&operation.label).is_some() {
            return Err(JobError::DuplicateLabel {
                label: operation.label,
            });
        }
        info!(
            job = %self.name,
            operation = %operation.label,
            kind = %operation.kind,
            tool = %operation.tool,
            "Operation appended"
        );
        let index = self.operations.len();
        self.operations.push(operation);
        Ok(&self.operations[index])
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Mesh {
        &self.target
    }

    /// `None` when the target mesh has no triangles
    pub fn target_bounds(&self) -> Option<BoundingBox> {
        self.target_bounds
    }

    pub fn stock(&self) -> Option<&Stock> {
        self.stock.as_ref()
    }

    /// Operations in declaration order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, label: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.label == label)
    }

    /// All generated motion, in append order
    pub fn toolpath(&self) -> &[MotionSegment] {
        &self.toolpath
    }

    pub fn spans(&self) -> &[ToolpathSpan] {
        &self.spans
    }

    pub fn is_generated(&self, label: &str) -> bool {
        self.spans.iter().any(|span| span.label == label)
    }

    /// Labels of operations without a toolpath, in declaration order
    pub fn pending_operations(&self) -> Vec<String> {
        self.operations
            .iter()
            .filter(|op| !self.is_generated(&op.label))
            .map(|op| op.label.clone())
            .collect()
    }

    /// Rest material after the operations generated so far
    pub fn removal(&self) -> Option<&RemovalMap> {
        self.removal.as_ref()
    }

    /// Append an operation's motion and carve it out of the rest material
    pub(crate) fn append_toolpath(
        &mut self,
        label: &str,
        tool: &Tool,
        spindle_speed: u32,
        segments: Vec<MotionSegment>,
        resolution: f64,
    ) {
        let start = self.toolpath.len();
        if let Some(stock) = &self.stock {
            let map = self
                .removal
                .get_or_insert_with(|| RemovalMap::new(stock, resolution));
            let cutter = Cutter::from_tool(tool);
            for segment in &segments {
                map.apply_segment(segment, &cutter);
            }
        }
        self.toolpath.extend(segments);
        self.spans.push(ToolpathSpan {
            label: label.to_string(),
            tool: tool.id.clone(),
            tool_number: tool.number,
            spindle_speed,
            range: start..self.toolpath.len(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationKind;
    use meshmill_model::build_stock;
    use nalgebra::Point3;

    fn job() -> Job {
        let mesh = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 5.0));
        Job::new("Test", mesh)
    }

    #[test]
    fn test_stock_set_once() {
        let mut job = job();
        let stock = build_stock(&job.target_bounds().unwrap(), 2.0).unwrap();
        job.attach_stock(stock).unwrap();
        assert_eq!(job.attach_stock(stock), Err(JobError::StockAlreadySet));
        assert_eq!(job.stock(), Some(&stock));
    }

    #[test]
    fn test_operations_append_in_order() {
        let mut job = job();
        job.append_operation(Operation::new(OperationKind::Pocket, "RoughingTool", "Rough"))
            .unwrap();
        job.append_operation(Operation::new(OperationKind::Pocket, "FinishingTool", "Finish"))
            .unwrap();

        let labels: Vec<_> = job.operations().iter().map(|op| op.label.as_str()).collect();
        assert_eq!(labels, vec!["Rough", "Finish"]);
        assert_eq!(job.pending_operations(), vec!["Rough", "Finish"]);
    }

    #[test]
    fn test_duplicate_label_leaves_job_unchanged() {
        let mut job = job();
        job.append_operation(Operation::new(OperationKind::Pocket, "RoughingTool", "Rough"))
            .unwrap();
        let err = job
            .append_operation(Operation::new(OperationKind::Contour, "FinishingTool", "Rough"))
            .unwrap_err();

        assert_eq!(
            err,
            JobError::DuplicateLabel {
                label: "Rough".into()
            }
        );
        assert_eq!(job.operations().len(), 1);
        assert_eq!(job.operations()[0].kind, OperationKind::Pocket);
    }

    #[test]
    fn test_append_toolpath_records_span_and_removal() {
        let mut job = job();
        let stock = build_stock(&job.target_bounds().unwrap(), 2.0).unwrap();
        job.attach_stock(stock).unwrap();
        job.append_operation(Operation::new(OperationKind::Pocket, "RoughingTool", "Rough"))
            .unwrap();

        let tool = Tool::new("RoughingTool", 1, "6mm", meshmill_core::ToolType::EndMillFlat, 6.0);
        let segs = vec![
            MotionSegment::rapid(Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 8.0)),
            MotionSegment::linear(Point3::new(0.0, 0.0, 8.0), Point3::new(0.0, 0.0, 6.0), 500.0),
            MotionSegment::linear(Point3::new(0.0, 0.0, 6.0), Point3::new(10.0, 0.0, 6.0), 1500.0),
        ];
        job.append_toolpath("Rough", &tool, 12000, segs, 0.5);

        assert!(job.is_generated("Rough"));
        assert!(job.pending_operations().is_empty());
        assert_eq!(job.toolpath().len(), 3);
        assert_eq!(job.spans()[0].range, 0..3);
        assert_eq!(job.spans()[0].tool_number, 1);

        let removal = job.removal().unwrap();
        assert_eq!(removal.get_height(5.0, 0.0), Some(6.0));
        assert_eq!(removal.get_height(5.0, 9.0), Some(7.0));
    }
}
