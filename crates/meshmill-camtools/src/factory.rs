//! Operation factory
//!
//! Builds an operation from loosely typed input (a kind tag, a tool id, a
//! label and named parameter values) and appends it to a job. Parameters
//! are applied best-effort: a rejected parameter is logged, recorded in the
//! operation's diagnostics and left at its default, and the remaining
//! parameters are still applied.

use crate::job::Job;
use crate::operation::{Operation, OperationKind};
use meshmill_core::{Error, ParamValue, ToolId};
use tracing::{debug, warn};

/// Create an operation and append it to `job`
///
/// Fails with [`meshmill_core::OperationError::UnsupportedKind`] for an
/// unknown kind tag and with [`meshmill_core::JobError::DuplicateLabel`]
/// when the label is taken; the job is unchanged in both cases.
pub fn create_operation<'j, I, S>(
    job: &'j mut Job,
    kind: &str,
    tool: impl Into<ToolId>,
    label: impl Into<String>,
    parameters: I,
) -> Result<&'j Operation, Error>
where
    I: IntoIterator<Item = (S, ParamValue)>,
    S: AsRef<str>,
{
    let kind: OperationKind = kind.parse()?;
    let mut operation = Operation::new(kind, tool, label);

    for (name, value) in parameters {
        let name = name.as_ref();
        match operation.apply(name, &value) {
            Ok(()) => debug!(
                operation = %operation.label,
                parameter = name,
                value = %value,
                "Parameter applied"
            ),
            Err(error) => {
                warn!(
                    operation = %operation.label,
                    parameter = name,
                    value = %value,
                    %error,
                    "Parameter not applied"
                );
                operation.diagnostics.push(error);
            }
        }
    }

    job.append_operation(operation).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshmill_core::ParameterError;
    use meshmill_model::Mesh;
    use nalgebra::Point3;

    fn job() -> Job {
        Job::new(
            "Factory",
            Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 10.0, 5.0)),
        )
    }

    #[test]
    fn test_creates_and_appends() {
        let mut job = job();
        let op = create_operation(
            &mut job,
            "PathPocket",
            "RoughingTool",
            "Rough",
            [
                ("PocketStrategy", ParamValue::from("Adaptive")),
                ("StockClearance", ParamValue::from(1.0)),
            ],
        )
        .unwrap();

        assert_eq!(op.kind, OperationKind::Pocket);
        assert_eq!(op.applied, vec!["PocketStrategy", "StockClearance"]);
        assert!(op.diagnostics.is_empty());
        assert_eq!(job.operations().len(), 1);
    }

    #[test]
    fn test_bad_parameter_is_skipped() {
        let mut job = job();
        let op = create_operation(
            &mut job,
            "Pocket",
            "RoughingTool",
            "Rough",
            [
                ("FeedRate", ParamValue::from(1500.0)),
                ("Wobble", ParamValue::from(3.0)),
                ("StockClearance", ParamValue::from("lots")),
            ],
        )
        .unwrap();

        assert_eq!(op.applied, vec!["FeedRate"]);
        assert_eq!(op.params.cutting.feed_rate, Some(1500.0));
        assert_eq!(op.diagnostics.len(), 2);
        assert!(matches!(op.diagnostics[0], ParameterError::Unknown { .. }));
        assert!(matches!(
            op.diagnostics[1],
            ParameterError::TypeMismatch { .. }
        ));
        assert_eq!(op.params.stock_clearance(), 0.0);
    }

    #[test]
    fn test_unsupported_kind_appends_nothing() {
        let mut job = job();
        let err = create_operation(
            &mut job,
            "Engrave",
            "RoughingTool",
            "Text",
            Vec::<(String, ParamValue)>::new(),
        )
        .unwrap_err();
        assert!(err.is_unsupported_kind());
        assert!(job.operations().is_empty());
    }

    #[test]
    fn test_duplicate_label_fails() {
        let mut job = job();
        let none = Vec::<(&str, ParamValue)>::new;
        create_operation(&mut job, "Pocket", "RoughingTool", "Rough", none()).unwrap();
        let err = create_operation(&mut job, "Contour", "FinishingTool", "Rough", none()).unwrap_err();
        assert!(err.is_duplicate_label());
        assert_eq!(job.operations().len(), 1);
        assert_eq!(job.operations()[0].kind, OperationKind::Pocket);
    }
}
