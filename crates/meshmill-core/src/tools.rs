//! Tool definitions and library lookup
//!
//! This module provides:
//! - Tool types and geometry
//! - Default cutting parameters per tool
//! - The [`ToolLookup`] seam through which toolpath generation resolves tool ids
//! - A standard in-memory library

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tool types for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum ToolType {
    /// Flat end mill
    EndMillFlat,
    /// Ball end mill / ball nose
    EndMillBall,
    /// Drill bit (twist drill)
    DrillBit,
}

impl ToolType {
    /// Get all tool types
    pub fn all() -> &'static [ToolType] {
        &[ToolType::EndMillFlat, ToolType::EndMillBall, ToolType::DrillBit]
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndMillFlat => write!(f, "Flat End Mill"),
            Self::EndMillBall => write!(f, "Ball End Mill"),
            Self::DrillBit => write!(f, "Drill Bit"),
        }
    }
}

/// Tool identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolId(
    /// The unique string identifier for the tool.
    pub String,
);

impl ToolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// True when no tool is assigned
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ToolId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ToolId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tool default cutting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCuttingParams {
    /// Recommended RPM
    pub rpm: u32,
    /// Default feed rate in mm/min
    pub feed_rate: f64,
    /// Default plunge rate in mm/min
    pub plunge_rate: f64,
    /// Default stepover as percentage of diameter
    pub stepover_percent: f64,
    /// Default depth per pass in mm
    pub depth_per_pass: f64,
}

impl Default for ToolCuttingParams {
    fn default() -> Self {
        Self {
            rpm: 12000,
            feed_rate: 1500.0,
            plunge_rate: 750.0,
            stepover_percent: 50.0,
            depth_per_pass: 3.0,
        }
    }
}

/// Complete tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Unique tool identifier
    pub id: ToolId,
    /// Tool number, used for `T<n> M6` tool changes
    pub number: u32,
    /// Display name
    pub name: String,
    /// Tool type
    pub tool_type: ToolType,
    /// Cutting diameter in mm
    pub diameter: f64,
    /// Flute length in mm
    pub flute_length: f64,
    /// Number of flutes
    pub flutes: u32,
    /// Default cutting parameters
    pub params: ToolCuttingParams,
}

impl Tool {
    /// Create a new tool with basic properties
    pub fn new(
        id: impl Into<String>,
        number: u32,
        name: impl Into<String>,
        tool_type: ToolType,
        diameter: f64,
    ) -> Self {
        Self {
            id: ToolId(id.into()),
            number,
            name: name.into(),
            tool_type,
            diameter,
            flute_length: diameter * 4.0,
            flutes: 2,
            params: ToolCuttingParams::default(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }

    /// Get a descriptive string for the tool
    pub fn description_short(&self) -> String {
        format!(
            "{} - {} {} mm dia, {} flutes",
            self.name, self.tool_type, self.diameter, self.flutes
        )
    }
}

/// Resolves tool ids to tool definitions
///
/// Toolpath generation only sees tools through this trait, so callers may
/// back it with any store.
pub trait ToolLookup {
    fn tool(&self, id: &ToolId) -> Option<&Tool>;
}

/// Tool library - in-memory collection of tools
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolLibrary {
    tools: BTreeMap<ToolId, Tool>,
}

impl ToolLibrary {
    /// Create a new empty tool library
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard library with the tools referenced by the bundled job files
    pub fn standard() -> Self {
        let mut library = Self::new();

        let mut roughing = Tool::new(
            "RoughingTool",
            1,
            "6 mm Flat End Mill",
            ToolType::EndMillFlat,
            6.0,
        );
        roughing.flute_length = 22.0;
        roughing.params.rpm = 12000;
        roughing.params.feed_rate = 1500.0;
        roughing.params.plunge_rate = 750.0;
        roughing.params.stepover_percent = 50.0;
        roughing.params.depth_per_pass = 3.0;
        library.add_tool(roughing);

        let mut finishing = Tool::new(
            "FinishingTool",
            2,
            "3 mm Flat End Mill",
            ToolType::EndMillFlat,
            3.0,
        );
        finishing.flute_length = 12.0;
        finishing.params.rpm = 18000;
        finishing.params.feed_rate = 1200.0;
        finishing.params.plunge_rate = 600.0;
        finishing.params.stepover_percent = 40.0;
        finishing.params.depth_per_pass = 1.5;
        library.add_tool(finishing);

        let mut ball = Tool::new(
            "BallTool",
            3,
            "6 mm Ball End Mill",
            ToolType::EndMillBall,
            6.0,
        );
        ball.flute_length = 20.0;
        ball.params.rpm = 16000;
        ball.params.feed_rate = 1000.0;
        ball.params.plunge_rate = 500.0;
        ball.params.stepover_percent = 15.0;
        ball.params.depth_per_pass = 1.0;
        library.add_tool(ball);

        let mut drill = Tool::new(
            "Drill5",
            4,
            "5 mm Twist Drill",
            ToolType::DrillBit,
            5.0,
        );
        drill.flute_length = 52.0;
        drill.params.rpm = 3000;
        drill.params.feed_rate = 300.0;
        drill.params.plunge_rate = 150.0;
        drill.params.stepover_percent = 100.0;
        drill.params.depth_per_pass = 5.0;
        library.add_tool(drill);

        let mut wide = Tool::new(
            "Roughing12",
            5,
            "12 mm Flat End Mill",
            ToolType::EndMillFlat,
            12.0,
        );
        wide.flute_length = 30.0;
        wide.flutes = 3;
        wide.params.rpm = 9000;
        wide.params.feed_rate = 2000.0;
        wide.params.plunge_rate = 800.0;
        wide.params.stepover_percent = 45.0;
        wide.params.depth_per_pass = 4.0;
        library.add_tool(wide);

        library
    }

    /// Add a tool to the library, replacing any tool with the same id
    pub fn add_tool(&mut self, tool: Tool) {
        self.tools.insert(tool.id.clone(), tool);
    }

    /// Get a tool by ID
    pub fn get_tool(&self, id: &ToolId) -> Option<&Tool> {
        self.tools.get(id)
    }

    /// Remove a tool from the library
    pub fn remove_tool(&mut self, id: &ToolId) -> Option<Tool> {
        self.tools.remove(id)
    }

    /// All tools, ordered by id
    pub fn tools(&self) -> impl Iterator<Item = &Tool> {
        self.tools.values()
    }

    /// Get tools by type
    pub fn get_tools_by_type(&self, tool_type: ToolType) -> Vec<&Tool> {
        self.tools
            .values()
            .filter(|t| t.tool_type == tool_type)
            .collect()
    }

    /// Get the number of tools in the library
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if library is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl ToolLookup for ToolLibrary {
    fn tool(&self, id: &ToolId) -> Option<&Tool> {
        self.get_tool(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_library_contents() {
        let library = ToolLibrary::standard();
        assert_eq!(library.len(), 5);

        let rough = library.tool(&ToolId::from("RoughingTool")).unwrap();
        assert_eq!(rough.diameter, 6.0);
        assert_eq!(rough.radius(), 3.0);
        assert_eq!(rough.params.feed_rate, 1500.0);

        let ball = library.tool(&"BallTool".into()).unwrap();
        assert_eq!(ball.tool_type, ToolType::EndMillBall);

        assert_eq!(library.get_tools_by_type(ToolType::DrillBit).len(), 1);
        assert!(library.tool(&"Missing".into()).is_none());
    }

    #[test]
    fn test_tools_ordered_by_id() {
        let library = ToolLibrary::standard();
        let ids: Vec<&str> = library.tools().map(|t| t.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_empty_tool_id() {
        assert!(ToolId::new("  ").is_empty());
        assert!(!ToolId::new("Drill5").is_empty());
    }
}
