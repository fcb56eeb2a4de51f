//! Job configuration files
//!
//! A job file names the model, the stock margin, the output path and the
//! ordered list of operations with their loosely typed parameters. Files
//! are TOML or JSON, chosen by extension.

use crate::error::{Result, SettingsError};
use meshmill_camtools::{GeneratorSettings, PostProcessor};
use meshmill_core::ParamValue;
use serde::{Deserialize, Serialize};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default stock margin around the model, mm
pub const DEFAULT_MARGIN: f64 = 5.0;

fn default_margin() -> f64 {
    DEFAULT_MARGIN
}

/// One `[[operations]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    /// Operation kind tag, e.g. `Pocket`
    pub kind: String,
    /// Tool id; empty means no tool assigned
    #[serde(default)]
    pub tool: String,
    /// Unique label within the job
    pub label: String,
    /// Named parameter values, applied best-effort in file order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub parameters: IndexMap<String, ParamValue>,
}

impl OperationConfig {
    pub fn new(kind: impl Into<String>, tool: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            tool: tool.into(),
            label: label.into(),
            parameters: IndexMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Complete job description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, written to the program header
    pub name: String,
    /// STL model path; relative paths resolve against the job file
    pub model: PathBuf,
    /// G-code output path; defaults to the model path with `.nc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    /// Stock margin around the model bounding box, mm
    #[serde(default = "default_margin")]
    pub margin: f64,
    #[serde(default)]
    pub post: PostProcessor,
    #[serde(default)]
    pub generator: GeneratorSettings,
    #[serde(default)]
    pub operations: Vec<OperationConfig>,
}

impl JobConfig {
    pub fn new(name: impl Into<String>, model: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            output: None,
            margin: DEFAULT_MARGIN,
            post: PostProcessor::default(),
            generator: GeneratorSettings::default(),
            operations: Vec::new(),
        }
    }

    /// Load a job file (JSON or TOML)
    ///
    /// Relative `model` and `output` paths are resolved against the file's
    /// directory.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        let mut config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        debug!(
            path = %path.display(),
            operations = config.operations.len(),
            "Job file loaded"
        );
        Ok(config)
    }

    /// Save the job file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SettingsError::invalid("name", "must not be empty"));
        }
        if self.model.as_os_str().is_empty() {
            return Err(SettingsError::invalid("model", "must not be empty"));
        }
        if !self.margin.is_finite() || self.margin < 0.0 {
            return Err(SettingsError::invalid(
                "margin",
                format!("must be a finite value >= 0, got {}", self.margin),
            ));
        }
        if self.post.precision > 6 {
            return Err(SettingsError::invalid("post.precision", "must be <= 6"));
        }
        if !(self.generator.removal_resolution > 0.0) {
            return Err(SettingsError::invalid(
                "generator.removal_resolution",
                "must be > 0",
            ));
        }
        if let Some(spacing) = self.generator.sample_spacing {
            if !(spacing > 0.0) {
                return Err(SettingsError::invalid(
                    "generator.sample_spacing",
                    "must be > 0",
                ));
            }
        }

        let mut labels = HashSet::new();
        for (i, op) in self.operations.iter().enumerate() {
            if op.kind.trim().is_empty() {
                return Err(SettingsError::invalid(
                    format!("operations[{}].kind", i),
                    "must not be empty",
                ));
            }
            if op.label.trim().is_empty() {
                return Err(SettingsError::invalid(
                    format!("operations[{}].label", i),
                    "must not be empty",
                ));
            }
            if !labels.insert(op.label.as_str()) {
                return Err(SettingsError::invalid(
                    format!("operations[{}].label", i),
                    format!("duplicate label '{}'", op.label),
                ));
            }
        }
        Ok(())
    }

    /// Output path, falling back to the model path with an `.nc` extension
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.model.with_extension("nc"))
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.model.is_relative() {
            self.model = base.join(&self.model);
        }
        if let Some(output) = self.output.as_mut() {
            if output.is_relative() {
                *output = base.join(&*output);
            }
        }
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            _ => Err(SettingsError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobConfig {
        let mut config = JobConfig::new("Bracket", "bracket.stl");
        config.operations.push(
            OperationConfig::new("Pocket", "RoughingTool", "Rough")
                .with_parameter("PocketStrategy", "Adaptive")
                .with_parameter("StockClearance", 1.0),
        );
        config
            .operations
            .push(OperationConfig::new("Pocket", "FinishingTool", "Finish"));
        config
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: JobConfig = toml::from_str(
            r#"
            name = "Minimal"
            model = "part.stl"
            "#,
        )
        .unwrap();

        assert_eq!(config.margin, DEFAULT_MARGIN);
        assert_eq!(config.post, PostProcessor::default());
        assert_eq!(config.generator, GeneratorSettings::default());
        assert!(config.operations.is_empty());
        assert_eq!(config.output_path(), PathBuf::from("part.nc"));
    }

    #[test]
    fn test_operations_parse_with_parameters() {
        let config: JobConfig = toml::from_str(
            r#"
            name = "Holes"
            model = "plate.stl"
            margin = 2.5

            [post]
            line_numbers = true

            [[operations]]
            kind = "Drilling"
            tool = "Drill5"
            label = "Holes"

            [operations.parameters]
            Locations = [[5.0, 5.0], [15.0, 5.0]]
            PeckDepth = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.margin, 2.5);
        assert!(config.post.line_numbers);
        assert_eq!(config.post.precision, 3);
        let op = &config.operations[0];
        assert_eq!(op.kind, "Drilling");
        assert_eq!(
            op.parameters["Locations"],
            ParamValue::Points(vec![[5.0, 5.0], [15.0, 5.0]])
        );
        assert_eq!(op.parameters["PeckDepth"], ParamValue::Number(3.0));
    }

    #[test]
    fn test_parameters_keep_file_order() {
        let config: JobConfig = toml::from_str(
            r#"
            name = "Order"
            model = "part.stl"

            [[operations]]
            kind = "Pocket"
            tool = "RoughingTool"
            label = "Rough"

            [operations.parameters]
            StockClearance = 1.0
            HorizFeed = 900
            FeedRate = 1500
            PocketStrategy = "Adaptive"
            "#,
        )
        .unwrap();

        let names: Vec<&str> = config.operations[0]
            .parameters
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, ["StockClearance", "HorizFeed", "FeedRate", "PocketStrategy"]);

        let json = serde_json::to_string(&config).unwrap();
        let back: JobConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_tool_is_empty() {
        let config: JobConfig = toml::from_str(
            r#"
            name = "NoTool"
            model = "part.stl"

            [[operations]]
            kind = "Pocket"
            label = "Rough"
            "#,
        )
        .unwrap();
        assert_eq!(config.operations[0].tool, "");
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.margin = -1.0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::Invalid { ref key, .. }) if key == "margin"
        ));

        let mut config = sample();
        config.operations[1].label = "Rough".into();
        assert!(matches!(
            config.validate(),
            Err(SettingsError::Invalid { ref key, .. }) if key == "operations[1].label"
        ));

        let mut config = sample();
        config.name = "  ".into();
        assert!(config.validate().is_err());

        let mut config = sample();
        config.generator.removal_resolution = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            sample().save_to_file(Path::new("job.yaml")),
            Err(SettingsError::UnsupportedFormat { .. })
        ));
    }
}
