//! Machining operations
//!
//! An operation pairs a machining strategy with a tool and its parameters.
//! The set of strategies is closed: every [`OperationKind`] has a planner.

use crate::params::{apply_parameter, OperationParams};
use meshmill_core::{OperationError, ParamValue, ParameterError, ToolId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported machining strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// Z-level area clearing (roughing and finishing)
    Pocket,
    /// Closed profile around the model silhouette
    Contour,
    /// Point drilling at explicit locations
    Drilling,
}

impl OperationKind {
    pub fn all() -> &'static [OperationKind] {
        &[
            OperationKind::Pocket,
            OperationKind::Contour,
            OperationKind::Drilling,
        ]
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pocket => write!(f, "Pocket"),
            Self::Contour => write!(f, "Contour"),
            Self::Drilling => write!(f, "Drilling"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = OperationError;

    /// Accepts the kind names and their common aliases, ignoring case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pocket" | "pathpocket" => Ok(Self::Pocket),
            "contour" | "profile" | "pathprofile" => Ok(Self::Contour),
            "drilling" | "drill" | "pathdrilling" => Ok(Self::Drilling),
            _ => Err(OperationError::UnsupportedKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// A machining operation attached to a job
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub tool: ToolId,
    /// Unique within the owning job
    pub label: String,
    pub params: OperationParams,
    /// Names of the parameters applied successfully, in application order
    pub applied: Vec<String>,
    /// Parameters that were rejected and left at their defaults
    pub diagnostics: Vec<ParameterError>,
}

impl Operation {
    /// Create an operation with the default parameters for `kind`
    pub fn new(kind: OperationKind, tool: impl Into<ToolId>, label: impl Into<String>) -> Self {
        Self {
            kind,
            tool: tool.into(),
            label: label.into(),
            params: OperationParams::for_kind(kind),
            applied: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Apply one named parameter
    ///
    /// On success the name is recorded in `applied`. On failure the
    /// parameters are untouched and the error is returned, not recorded.
    pub fn apply(&mut self, name: &str, value: &ParamValue) -> Result<(), ParameterError> {
        apply_parameter(self.kind, &mut self.params, name, value)?;
        self.applied.push(name.to_string());
        Ok(())
    }
}
