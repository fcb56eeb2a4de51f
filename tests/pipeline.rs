use meshmill::camtools::motion_lines;
use meshmill_core::{ExportError, ToolLibrary, ToolpathError};
use meshmill::model::Mesh;
use meshmill::settings::{JobConfig, OperationConfig};
use meshmill::{build_job, inspect, run_job, run_pipeline};
use nalgebra::Point3;
use tempfile::TempDir;

fn block() -> Mesh {
    Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(100.0, 50.0, 20.0))
}

fn rough_and_finish() -> JobConfig {
    let mut config = JobConfig::new("Block", "block.stl");
    config.operations = vec![
        OperationConfig::new("Pocket", "RoughingTool", "Rough")
            .with_parameter("FeedRate", 1500)
            .with_parameter("PocketStrategy", "Adaptive")
            .with_parameter("StockMode", "BoundingBox")
            .with_parameter("StockClearance", 1.0),
        OperationConfig::new("Pocket", "FinishingTool", "Finish")
            .with_parameter("FeedRate", 1200)
            .with_parameter("PocketStrategy", "ZigZag")
            .with_parameter("StockMode", "BoundingBox")
            .with_parameter("StockClearance", 0.5),
    ];
    config
}

/// Feed words of every motion line, in program order
fn feeds(gcode: &str) -> Vec<f64> {
    motion_lines(gcode)
        .flat_map(|line| line.split_whitespace())
        .filter_map(|word| word.strip_prefix('F'))
        .filter_map(|value| value.parse().ok())
        .collect()
}

fn ascii_stl(mesh: &Mesh) -> String {
    let mut out = String::from("solid block\n");
    for tri in mesh.triangles() {
        out.push_str(&format!(
            "facet normal {} {} {}\nouter loop\n",
            tri.normal.x, tri.normal.y, tri.normal.z
        ));
        for v in &tri.vertices {
            out.push_str(&format!("vertex {} {} {}\n", v.x, v.y, v.z));
        }
        out.push_str("endloop\nendfacet\n");
    }
    out.push_str("endsolid block\n");
    out
}

#[test]
fn test_end_to_end_rough_and_finish() {
    let config = rough_and_finish();
    let output = run_pipeline(&config, block(), &ToolLibrary::standard()).unwrap();
    let job = &output.job;

    let stock = job.stock().unwrap();
    assert_eq!(stock.origin, Point3::new(-5.0, -5.0, -5.0));
    assert_eq!((stock.length, stock.width, stock.height), (110.0, 60.0, 30.0));

    assert_eq!(job.spans().len(), 2);
    assert_eq!(job.spans()[0].label, "Rough");
    assert_eq!(job.spans()[1].label, "Finish");

    let gcode = &output.gcode;
    assert!(gcode.contains("; Stock origin: X-5.000 Y-5.000 Z-5.000\n"));
    assert!(gcode.contains("; Stock size: 110.000 x 60.000 x 30.000 mm\n"));

    let feeds = feeds(gcode);
    assert_eq!(feeds.first(), Some(&1500.0));
    let first_finish = feeds.iter().position(|&f| f == 1200.0).unwrap();
    assert!(feeds[..first_finish].iter().all(|&f| f == 1500.0));
    assert!(feeds[first_finish..].iter().all(|&f| f == 1200.0));

    assert_eq!(motion_lines(gcode).count(), job.toolpath().len());
    assert!(gcode.find("T1 M6").unwrap() < gcode.find("T2 M6").unwrap());
}

#[test]
fn test_export_is_idempotent() {
    let mut config = rough_and_finish();
    config.operations.truncate(1);
    let output = run_pipeline(&config, block(), &ToolLibrary::standard()).unwrap();

    let again = config.post.export(&output.job).unwrap();
    assert_eq!(again, output.gcode);
}

#[test]
fn test_duplicate_label_fails_the_job() {
    let mut config = rough_and_finish();
    config.operations[1].label = "Rough".into();

    let err = build_job(&config, block()).unwrap_err();
    let core = err.downcast_ref::<meshmill_core::Error>().unwrap();
    assert!(core.is_duplicate_label());
}

#[test]
fn test_partial_parameters_still_create_the_operation() {
    let mut config = rough_and_finish();
    config.operations[0] = config.operations[0]
        .clone()
        .with_parameter("StockClearance", "plenty")
        .with_parameter("Wobble", 2.0);

    let job = build_job(&config, block()).unwrap();
    let rough = job.operation("Rough").unwrap();
    assert_eq!(rough.diagnostics.len(), 2);
    assert!(rough.applied.iter().any(|name| name == "PocketStrategy"));
    assert!(rough.applied.iter().any(|name| name == "StockMode"));
    assert_eq!(job.operations().len(), 2);
}

#[test]
fn test_parameters_apply_in_file_order() {
    let mut config = rough_and_finish();
    config.operations[0] = config.operations[0].clone().with_parameter("HorizFeed", 900);

    let job = build_job(&config, block()).unwrap();
    let rough = job.operation("Rough").unwrap();
    assert_eq!(rough.params.cutting.feed_rate, Some(900.0));
    assert_eq!(rough.applied.first().map(String::as_str), Some("FeedRate"));
    assert_eq!(rough.applied.last().map(String::as_str), Some("HorizFeed"));
}

#[test]
fn test_operation_with_nothing_left_to_cut_still_exports() {
    let mut config = JobConfig::new("Cleared", "block.stl");
    config.operations = vec![
        OperationConfig::new("Pocket", "RoughingTool", "Rough").with_parameter("StockClearance", 0.5),
        OperationConfig::new("Pocket", "RoughingTool", "Finish").with_parameter("StockClearance", 1.0),
    ];
    let mesh = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(30.0, 20.0, 10.0));

    let output = run_pipeline(&config, mesh, &ToolLibrary::standard()).unwrap();
    let job = &output.job;
    assert!(job.pending_operations().is_empty());
    assert_eq!(job.spans().len(), 2);
    assert!(!job.spans()[0].range.is_empty());
    assert!(job.spans()[1].range.is_empty());

    let gcode = &output.gcode;
    assert!(gcode.contains("; Operation: Finish (nothing to cut)\n"));
    assert_eq!(motion_lines(gcode).count(), job.toolpath().len());
    assert!(gcode.ends_with("M5\nM30\n"));
}

#[test]
fn test_job_without_operations_has_nothing_to_export() {
    let config = JobConfig::new("Empty", "block.stl");
    let err = run_pipeline(&config, block(), &ToolLibrary::standard()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ExportError>(),
        Some(ExportError::EmptyToolpath { .. })
    ));
}

#[test]
fn test_unknown_tool_fails_generation() {
    let mut config = rough_and_finish();
    config.operations[1].tool = "Engraver".into();

    let err = run_pipeline(&config, block(), &ToolLibrary::standard()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ToolpathError>(),
        Some(ToolpathError::UnknownTool { .. })
    ));
}

#[test]
fn test_run_job_writes_the_program() {
    let dir = TempDir::new().unwrap();
    let model = dir.path().join("block.stl");
    let small = Mesh::cuboid(Point3::new(0.0, 0.0, 0.0), Point3::new(20.0, 10.0, 5.0));
    std::fs::write(&model, ascii_stl(&small)).unwrap();

    let mut config = JobConfig::new("Small", &model);
    config.operations = vec![OperationConfig::new("Contour", "RoughingTool", "Profile")];

    let path = run_job(&config, None, &ToolLibrary::standard()).unwrap();
    assert_eq!(path, dir.path().join("block.nc"));

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("; Job: Small\n"));
    assert!(text.ends_with("M5\nM30\n"));

    let report = inspect(&model, 5.0).unwrap();
    assert_eq!(report.triangles, 12);
    assert_eq!(report.stock.length, 30.0);
}

#[test]
fn test_missing_model_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = JobConfig::new("Missing", dir.path().join("nope.stl"));
    let err = run_job(&config, None, &ToolLibrary::standard()).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to load model"));
}
