//! G-code post-processor
//!
//! Serializes a job's toolpath into a G-code program: header comments,
//! modal setup, one block per operation span and one line per motion
//! segment. Output depends only on the job, so exporting the same job twice
//! yields identical text.

use crate::job::{Job, ToolpathSpan};
use crate::toolpath::{Motion, MotionSegment};
use meshmill_core::{ExportError, ToolId};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::info;

/// Output formatting options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessor {
    /// Prefix every command line with `N<n>`, counting in tens
    pub line_numbers: bool,
    /// Decimal places for coordinates
    pub precision: usize,
    /// Emit `;` comment lines
    pub comments: bool,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self {
            line_numbers: false,
            precision: 3,
            comments: true,
        }
    }
}

/// Program text under construction
struct Program {
    text: String,
    line_numbers: bool,
    next_line: u32,
}

impl Program {
    fn command(&mut self, command: &str) {
        if self.line_numbers {
            let _ = write!(self.text, "N{} ", self.next_line);
            self.next_line += 10;
        }
        self.text.push_str(command);
        self.text.push('\n');
    }

    fn comment(&mut self, comment: &str) {
        self.text.push_str("; ");
        self.text.push_str(comment);
        self.text.push('\n');
    }
}

impl PostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the whole job toolpath
    pub fn export(&self, job: &Job) -> Result<String, ExportError> {
        if job.toolpath().is_empty() {
            return Err(ExportError::EmptyToolpath {
                job: job.name().to_string(),
            });
        }

        let mut program = Program {
            text: String::new(),
            line_numbers: self.line_numbers,
            next_line: 10,
        };

        if self.comments {
            program.comment(&format!("Job: {}", job.name()));
            if let Some(stock) = job.stock() {
                program.comment(&format!(
                    "Stock origin: X{} Y{} Z{}",
                    self.coord(stock.origin.x),
                    self.coord(stock.origin.y),
                    self.coord(stock.origin.z)
                ));
                program.comment(&format!(
                    "Stock size: {} x {} x {} mm",
                    self.coord(stock.length),
                    self.coord(stock.width),
                    self.coord(stock.height)
                ));
            }
            program.comment(&format!("Operations: {}", job.operations().len()));
        }

        program.command("G90");
        program.command("G21");
        program.command("G17");

        let mut current_tool: Option<&ToolId> = None;
        for span in job.spans() {
            self.write_span(&mut program, job, span, &mut current_tool);
        }

        program.command("M5");
        program.command("M30");

        info!(
            job = job.name(),
            segments = job.toolpath().len(),
            bytes = program.text.len(),
            "G-code exported"
        );
        Ok(program.text)
    }

    fn write_span<'j>(
        &self,
        program: &mut Program,
        job: &'j Job,
        span: &'j ToolpathSpan,
        current_tool: &mut Option<&'j ToolId>,
    ) {
        if span.range.is_empty() {
            if self.comments {
                program.comment(&format!("Operation: {} (nothing to cut)", span.label));
            }
            return;
        }
        if self.comments {
            program.comment(&format!("Operation: {} (tool {})", span.label, span.tool));
        }
        if *current_tool != Some(&span.tool) {
            if current_tool.is_some() {
                program.command("M5");
            }
            program.command(&format!("T{} M6", span.tool_number));
            *current_tool = Some(&span.tool);
        }
        program.command(&format!("M3 S{}", span.spindle_speed));

        for segment in &job.toolpath()[span.range.clone()] {
            program.command(&self.motion_line(segment));
        }
    }

    /// Exactly one G-code command for a segment
    fn motion_line(&self, seg: &MotionSegment) -> String {
        let (x, y, z) = (
            self.coord(seg.end.x),
            self.coord(seg.end.y),
            self.coord(seg.end.z),
        );
        match seg.motion {
            Motion::Rapid => format!("G00 X{} Y{} Z{}", x, y, z),
            Motion::Linear => format!("G01 X{} Y{} Z{} F{:.0}", x, y, z, seg.feed_rate),
            Motion::ArcCw | Motion::ArcCcw => {
                let code = if seg.motion == Motion::ArcCw { "G02" } else { "G03" };
                let center = seg.center.unwrap_or(seg.start);
                format!(
                    "{} X{} Y{} Z{} I{} J{} F{:.0}",
                    code,
                    x,
                    y,
                    z,
                    self.coord(center.x - seg.start.x),
                    self.coord(center.y - seg.start.y),
                    seg.feed_rate
                )
            }
        }
    }

    /// Fixed-precision number without a negative zero
    fn coord(&self, v: f64) -> String {
        let half_ulp = 0.5 * 10f64.powi(-(self.precision as i32));
        let v = if v.abs() < half_ulp { 0.0 } else { v };
        format!("{:.*}", self.precision, v)
    }
}

/// Export with the default post-processor
pub fn export(job: &Job) -> Result<String, ExportError> {
    PostProcessor::default().export(job)
}

/// Lines of a program that move the machine
pub fn motion_lines(program: &str) -> impl Iterator<Item = &str> {
    program.lines().filter(|line| {
        let command = match line.strip_prefix('N') {
            Some(rest) => rest.split_once(' ').map_or("", |(_, cmd)| cmd),
            None => line,
        };
        ["G00", "G01", "G02", "G03"]
            .iter()
            .any(|code| command.starts_with(code))
    })
}
