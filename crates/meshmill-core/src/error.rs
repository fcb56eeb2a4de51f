//! Error handling for meshmill
//!
//! One error enum per pipeline stage:
//! - Geometry loading (mesh files)
//! - Stock derivation
//! - Job bookkeeping (stock attachment, operation labels)
//! - Operation creation and parameter application
//! - Toolpath generation
//! - G-code export
//!
//! All error types use `thiserror`. [`ParameterError`] is the only recoverable
//! kind: it is collected on the operation instead of being returned.

use thiserror::Error;

/// Geometry loading error
///
/// Raised when a mesh cannot be read or does not describe a usable solid.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryLoadError {
    /// The mesh source could not be opened or parsed
    #[error("Failed to read mesh from {path}: {reason}")]
    Unreadable {
        /// The file path or stream name.
        path: String,
        /// The underlying I/O or parse failure.
        reason: String,
    },

    /// The mesh contains no triangles
    #[error("Mesh {path} contains no triangles")]
    Empty {
        /// The file path or stream name.
        path: String,
    },

    /// The mesh bounding box has zero extent on at least one axis
    #[error("Mesh {path} is degenerate: bounding box is {dx} x {dy} x {dz}")]
    Degenerate {
        /// The file path or stream name.
        path: String,
        /// Extent along X.
        dx: f64,
        /// Extent along Y.
        dy: f64,
        /// Extent along Z.
        dz: f64,
    },

    /// A vertex coordinate is NaN or infinite
    #[error("Mesh {path} contains a non-finite vertex coordinate")]
    NonFinite {
        /// The file path or stream name.
        path: String,
    },
}

/// Stock derivation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StockError {
    /// Margin is negative or not a finite number
    #[error("Invalid stock margin {margin}: margin must be a finite value >= 0")]
    InvalidMargin {
        /// The rejected margin in mm.
        margin: f64,
    },
}

/// Job bookkeeping error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Stock can only be attached once per job
    #[error("Stock is already set for this job")]
    StockAlreadySet,

    /// Operation labels are unique within a job
    #[error("An operation labelled '{label}' already exists")]
    DuplicateLabel {
        /// The duplicated label.
        label: String,
    },
}

/// Operation creation error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// The requested machining strategy is not supported
    #[error("Unsupported operation kind: {kind}")]
    UnsupportedKind {
        /// The rejected kind tag.
        kind: String,
    },
}

/// Parameter application error
///
/// Recoverable: the factory logs it, stores it on the operation and keeps
/// the parameter's default.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// No parameter of this name exists for the operation kind
    #[error("Unknown parameter '{name}' for {kind} operation")]
    Unknown {
        /// The parameter name as supplied.
        name: String,
        /// The operation kind it was applied to.
        kind: String,
    },

    /// The value has the wrong type for the parameter
    #[error("Parameter '{name}' expects {expected}, got {found}")]
    TypeMismatch {
        /// The parameter name as supplied.
        name: String,
        /// Description of the accepted type.
        expected: String,
        /// Description of the supplied value.
        found: String,
    },

    /// The value has the right type but is outside the accepted range
    #[error("Parameter '{name}' value {value} is invalid: {reason}")]
    InvalidValue {
        /// The parameter name as supplied.
        name: String,
        /// The supplied value, rendered.
        value: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ParameterError {
    /// Name of the parameter that failed
    pub fn parameter(&self) -> &str {
        match self {
            Self::Unknown { name, .. }
            | Self::TypeMismatch { name, .. }
            | Self::InvalidValue { name, .. } => name,
        }
    }
}

/// Toolpath generation error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolpathError {
    /// The job has no stock attached
    #[error("Job has no stock; attach stock before generating toolpaths")]
    MissingStock,

    /// The job's target mesh has no triangles
    #[error("Job has no target geometry")]
    MissingTarget,

    /// No operation with this label exists in the job
    #[error("No operation labelled '{label}'")]
    UnknownOperation {
        /// The requested label.
        label: String,
    },

    /// The operation has no tool assigned
    #[error("Operation '{label}' has no tool assigned")]
    NoTool {
        /// The operation label.
        label: String,
    },

    /// The operation's tool is not in the tool library
    #[error("Operation '{label}' uses unknown tool '{tool}'")]
    UnknownTool {
        /// The operation label.
        label: String,
        /// The unresolved tool id.
        tool: String,
    },

    /// The operation's toolpath has already been appended to the job
    #[error("Toolpath for operation '{label}' was already generated")]
    AlreadyGenerated {
        /// The operation label.
        label: String,
    },

    /// The operation cannot be machined with the given geometry and parameters
    #[error("Operation '{label}' cannot be machined: {reason}")]
    Unsatisfiable {
        /// The operation label.
        label: String,
        /// Why no path exists.
        reason: String,
    },
}

/// G-code export error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportError {
    /// The job has no motion to export
    #[error("Job '{job}' has an empty toolpath")]
    EmptyToolpath {
        /// The job name.
        job: String,
    },
}

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Loading the mesh
    GeometryLoad,
    /// Deriving the stock block
    Stock,
    /// Job bookkeeping
    Job,
    /// Creating operations
    Operation,
    /// Generating toolpaths
    Toolpath,
    /// Exporting G-code
    Export,
    /// Reading or writing files
    Io,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GeometryLoad => write!(f, "geometry load"),
            Self::Stock => write!(f, "stock"),
            Self::Job => write!(f, "job"),
            Self::Operation => write!(f, "operation"),
            Self::Toolpath => write!(f, "toolpath generation"),
            Self::Export => write!(f, "export"),
            Self::Io => write!(f, "I/O"),
        }
    }
}

/// Main error type for meshmill
///
/// A unified error type covering every fatal pipeline failure. The display
/// text is prefixed with the stage that failed.
#[derive(Error, Debug)]
pub enum Error {
    /// Geometry load error
    #[error("geometry load failed: {0}")]
    GeometryLoad(#[from] GeometryLoadError),

    /// Stock error
    #[error("stock derivation failed: {0}")]
    Stock(#[from] StockError),

    /// Job error
    #[error("job update failed: {0}")]
    Job(#[from] JobError),

    /// Operation error
    #[error("operation creation failed: {0}")]
    Operation(#[from] OperationError),

    /// Toolpath error
    #[error("toolpath generation failed: {0}")]
    Toolpath(#[from] ToolpathError),

    /// Export error
    #[error("export failed: {0}")]
    Export(#[from] ExportError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The pipeline stage this error belongs to
    pub fn stage(&self) -> Stage {
        match self {
            Error::GeometryLoad(_) => Stage::GeometryLoad,
            Error::Stock(_) => Stage::Stock,
            Error::Job(_) => Stage::Job,
            Error::Operation(_) => Stage::Operation,
            Error::Toolpath(_) => Stage::Toolpath,
            Error::Export(_) => Stage::Export,
            Error::Io(_) => Stage::Io,
        }
    }

    /// Check if this is a duplicate label error
    pub fn is_duplicate_label(&self) -> bool {
        matches!(self, Error::Job(JobError::DuplicateLabel { .. }))
    }

    /// Check if this is an unsupported operation kind error
    pub fn is_unsupported_kind(&self) -> bool {
        matches!(self, Error::Operation(OperationError::UnsupportedKind { .. }))
    }

    /// Check if this is an empty toolpath export error
    pub fn is_empty_toolpath(&self) -> bool {
        matches!(self, Error::Export(ExportError::EmptyToolpath { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prefixes_display() {
        let err: Error = StockError::InvalidMargin { margin: -1.0 }.into();
        assert_eq!(err.stage(), Stage::Stock);
        assert!(err.to_string().starts_with("stock derivation failed"));

        let err: Error = ExportError::EmptyToolpath { job: "J".into() }.into();
        assert_eq!(err.stage(), Stage::Export);
        assert!(err.is_empty_toolpath());
    }

    #[test]
    fn test_parameter_error_name() {
        let err = ParameterError::TypeMismatch {
            name: "FeedRate".into(),
            expected: "number".into(),
            found: "text".into(),
        };
        assert_eq!(err.parameter(), "FeedRate");
    }

    #[test]
    fn test_duplicate_label_helper() {
        let err: Error = JobError::DuplicateLabel {
            label: "Rough".into(),
        }
        .into();
        assert!(err.is_duplicate_label());
        assert!(!err.is_unsupported_kind());
        assert_eq!(err.stage().to_string(), "job");
    }
}
