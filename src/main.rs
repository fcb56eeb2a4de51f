//! meshmill command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use meshmill::settings::{JobConfig, DEFAULT_MARGIN};
use meshmill::{init_logging, inspect, run_job};
use meshmill_core::ToolLibrary;
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_DATE"), ")");

#[derive(Parser)]
#[command(name = "meshmill")]
#[command(about = "Generate G-code from an STL model", long_about = None)]
#[command(version = LONG_VERSION)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job file and write the G-code program
    Run {
        /// Job file (.toml or .json)
        job: PathBuf,
        /// Output path, overriding the job file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a model's bounding box and derived stock
    Inspect {
        /// STL model
        model: PathBuf,
        /// Stock margin in mm
        #[arg(long, default_value_t = DEFAULT_MARGIN)]
        margin: f64,
    },
    /// List the built-in tool library
    Tools,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs)?;

    match cli.command {
        Commands::Run { job, output } => {
            let config = JobConfig::load_from_file(&job)?;
            let path = run_job(&config, output.as_deref(), &ToolLibrary::standard())?;
            println!("G-code exported to: {}", path.display());
        }
        Commands::Inspect { model, margin } => {
            let report = inspect(&model, margin)?;
            let (min, max) = (report.bounds.min(), report.bounds.max());
            println!("Model:     {}", model.display());
            println!("Triangles: {}", report.triangles);
            println!(
                "Bounds:    ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
                min.x, min.y, min.z, max.x, max.y, max.z
            );
            println!(
                "Stock:     origin ({:.3}, {:.3}, {:.3}), {:.3} x {:.3} x {:.3} mm",
                report.stock.origin.x,
                report.stock.origin.y,
                report.stock.origin.z,
                report.stock.length,
                report.stock.width,
                report.stock.height
            );
        }
        Commands::Tools => {
            let library = ToolLibrary::standard();
            let mut tools: Vec<_> = library.tools().collect();
            tools.sort_by_key(|tool| tool.number);
            for tool in tools {
                println!("T{:<3} {:<14} {}", tool.number, tool.id.as_str(), tool.description_short());
            }
        }
    }

    Ok(())
}
