//! # meshmill core
//!
//! Shared types for the meshmill workspace: the error taxonomy, loosely
//! typed operation parameter values and the tool library.

pub mod error;
pub mod param;
pub mod tools;

pub use error::{
    Error, ExportError, GeometryLoadError, JobError, OperationError, ParameterError, Result,
    Stage, StockError, ToolpathError,
};
pub use param::ParamValue;
pub use tools::{Tool, ToolCuttingParams, ToolId, ToolLibrary, ToolLookup, ToolType};
