//! # meshmill camtools
//!
//! Jobs, machining operations and everything downstream of them:
//! parameter schemas, toolpath planning, rest material tracking and G-code
//! export.

pub mod factory;
pub mod job;
pub mod operation;
pub mod params;
pub mod post;
pub mod removal;
pub mod toolpath;

pub use factory::create_operation;
pub use job::{Job, ToolpathSpan};
pub use operation::{Operation, OperationKind};
pub use params::{
    parameter_names, ContourParams, CuttingParams, DrillingParams, OperationParams, PocketParams,
    PocketStrategy, StockMode, StrategyParams,
};
pub use post::{export, motion_lines, PostProcessor};
pub use removal::RemovalMap;
pub use toolpath::{
    CancelToken, GenerationReport, GeneratorSettings, Motion, MotionSegment, ToolpathGenerator,
};
