//! # meshmill
//!
//! Turns an STL model into a single G-code program:
//!
//! 1. **meshmill-model** - STL loading, bounding box, stock block
//! 2. **meshmill-camtools** - jobs, operations, toolpaths, rest material, G-code export
//! 3. **meshmill-settings** - job configuration files
//! 4. **meshmill-core** - errors, parameter values, tool library
//!
//! This crate wires the stages together and owns the `meshmill` binary.

use anyhow::Context;
use meshmill_camtools::{create_operation, CancelToken, Job, ToolpathGenerator};
use meshmill_core::ToolLookup;
use meshmill_model::{build_stock, BoundingBox, Mesh, Stock};
use meshmill_settings::JobConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use meshmill_camtools as camtools;
pub use meshmill_model as model;
pub use meshmill_settings as settings;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging
///
/// `RUST_LOG` controls the filter (default `info`); output goes to stderr so
/// program text printed to stdout stays clean.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).json())
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .try_init()?;
    }
    Ok(())
}

/// A generated job and its exported program
#[derive(Debug)]
pub struct PipelineOutput {
    pub job: Job,
    pub gcode: String,
}

/// Build the job for `config` around an already loaded mesh
///
/// Attaches the stock and appends every configured operation in order.
pub fn build_job(config: &JobConfig, mesh: Mesh) -> anyhow::Result<Job> {
    let mut job = Job::new(config.name.clone(), mesh);
    let bounds = job
        .target_bounds()
        .context("Model has no geometry to build stock around")?;
    let stock = build_stock(&bounds, config.margin).context("Failed to build stock")?;
    job.attach_stock(stock).context("Failed to attach stock")?;

    for op in &config.operations {
        let parameters = op
            .parameters
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone()));
        let created = create_operation(&mut job, &op.kind, op.tool.as_str(), op.label.clone(), parameters)
            .with_context(|| format!("Failed to create operation '{}'", op.label))?;
        if !created.diagnostics.is_empty() {
            warn!(
                operation = %created.label,
                rejected = created.diagnostics.len(),
                "Operation created with default values for rejected parameters"
            );
        }
    }
    Ok(job)
}

/// Generate every operation and export the program
pub fn run_pipeline(
    config: &JobConfig,
    mesh: Mesh,
    tools: &dyn ToolLookup,
) -> anyhow::Result<PipelineOutput> {
    let mut job = build_job(config, mesh)?;

    let generator = ToolpathGenerator::new(tools).with_settings(config.generator);
    let report = generator
        .generate_all(&mut job, &CancelToken::new())
        .context("Toolpath generation failed")?;
    info!(
        job = job.name(),
        operations = report.generated.len(),
        segments = job.toolpath().len(),
        "Toolpaths generated"
    );

    let gcode = config
        .post
        .export(&job)
        .context("G-code export failed")?;
    Ok(PipelineOutput { job, gcode })
}

/// Run a job file end to end and write the program
///
/// Returns the path written.
pub fn run_job(
    config: &JobConfig,
    output: Option<&Path>,
    tools: &dyn ToolLookup,
) -> anyhow::Result<PathBuf> {
    let (mesh, _) = meshmill_model::load(&config.model)
        .with_context(|| format!("Failed to load model {}", config.model.display()))?;

    let result = run_pipeline(config, mesh, tools)?;

    let path = output.map(Path::to_path_buf).unwrap_or_else(|| config.output_path());
    std::fs::write(&path, &result.gcode)
        .with_context(|| format!("Failed to write G-code to {}", path.display()))?;
    info!(path = %path.display(), bytes = result.gcode.len(), "G-code exported to: {}", path.display());
    Ok(path)
}

/// Model facts reported by `meshmill inspect`
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub triangles: usize,
    pub bounds: BoundingBox,
    pub stock: Stock,
}

/// Load a model and derive its stock
pub fn inspect(path: &Path, margin: f64) -> anyhow::Result<Inspection> {
    let (mesh, bounds) = meshmill_model::load(path)
        .with_context(|| format!("Failed to load model {}", path.display()))?;
    let stock = build_stock(&bounds, margin).context("Failed to build stock")?;
    Ok(Inspection {
        triangles: mesh.triangle_count(),
        bounds,
        stock,
    })
}
