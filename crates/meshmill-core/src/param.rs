//! Loosely typed parameter values
//!
//! Operation parameters arrive from configuration files and callers as
//! name/value pairs. [`ParamValue`] is the value half; the operation factory
//! checks each value against the typed setter registered for its name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single operation parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Numeric value (integers are widened)
    Number(f64),
    /// Free text, usually an enumerated choice
    Text(String),
    /// List of XY points
    Points(Vec<[f64; 2]>),
}

impl ParamValue {
    /// Short name of the value's type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Points(_) => "point list",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_points(&self) -> Option<&[[f64; 2]]> {
        match self {
            Self::Points(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "\"{}\"", s),
            Self::Points(points) => {
                write!(f, "[")?;
                for (i, [x, y]) in points.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "({}, {})", x, y)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<[f64; 2]>> for ParamValue {
    fn from(value: Vec<[f64; 2]>) -> Self {
        Self::Points(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Params {
        feed: ParamValue,
        climb: ParamValue,
        strategy: ParamValue,
        holes: ParamValue,
    }

    #[test]
    fn test_untagged_from_toml() {
        let params: Params = toml::from_str(
            r#"
            feed = 1500
            climb = true
            strategy = "ZigZag"
            holes = [[1.0, 2.0], [3, 4]]
            "#,
        )
        .unwrap();

        assert_eq!(params.feed, ParamValue::Number(1500.0));
        assert_eq!(params.climb, ParamValue::Bool(true));
        assert_eq!(params.strategy.as_text(), Some("ZigZag"));
        assert_eq!(
            params.holes.as_points(),
            Some(&[[1.0, 2.0], [3.0, 4.0]][..])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ParamValue::from(12.5).to_string(), "12.5");
        assert_eq!(ParamValue::from("Stock").to_string(), "\"Stock\"");
        assert_eq!(
            ParamValue::from(vec![[1.0, 2.0]]).to_string(),
            "[(1, 2)]"
        );
        assert_eq!(ParamValue::from(true).type_name(), "bool");
    }
}
