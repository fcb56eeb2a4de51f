//! Operation parameter schema
//!
//! Each operation kind owns a setter table mapping a normalised parameter
//! name to a typed setter. Names are compared after lower-casing and
//! dropping `_`, `-` and spaces, so `FeedRate`, `feed_rate` and `feedrate`
//! address the same field. Values that are tool dependent stay `None`
//! until the toolpath generator resolves them against the tool library.

use crate::operation::OperationKind;
use meshmill_core::{ParamValue, ParameterError};
use serde::{Deserialize, Serialize};

/// Default rapid clearance above the stock top (mm)
pub const DEFAULT_SAFE_HEIGHT: f64 = 5.0;

/// Default adaptive radial engagement (degrees)
pub const DEFAULT_ENGAGEMENT_ANGLE: f64 = 60.0;

/// Parameters shared by every operation kind
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingParams {
    /// Cutting feed in mm/min, tool default when unset
    pub feed_rate: Option<f64>,
    /// Plunge feed in mm/min, `feed_rate` when unset
    pub plunge_rate: Option<f64>,
    /// Spindle RPM, tool default when unset
    pub spindle_speed: Option<u32>,
    /// Depth per Z level, tool default when unset
    pub step_down: Option<f64>,
    /// Rapid clearance above the stock top
    pub safe_height: f64,
    /// Lowest Z to machine, model bottom when unset
    pub final_depth: Option<f64>,
}

impl Default for CuttingParams {
    fn default() -> Self {
        Self {
            feed_rate: None,
            plunge_rate: None,
            spindle_speed: None,
            step_down: None,
            safe_height: DEFAULT_SAFE_HEIGHT,
            final_depth: None,
        }
    }
}

/// Remaining-material region used by pocketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StockMode {
    /// Clear across the whole stock block
    #[default]
    Stock,
    /// Clear only the model box grown by the tool diameter and clearance
    BoundingBox,
}

/// Fill pattern used by pocketing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PocketStrategy {
    /// Bidirectional raster passes
    #[default]
    ZigZag,
    /// Inset rings, outside in
    ContourParallel,
    /// Inset rings, inside out, stepover limited by radial engagement
    Adaptive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PocketParams {
    pub strategy: PocketStrategy,
    pub stock_mode: StockMode,
    /// Material left on the final surface (mm)
    pub stock_clearance: f64,
    /// Stepover as % of tool diameter, tool default when unset
    pub step_over: Option<f64>,
    /// Raster direction in degrees from the X axis
    pub raster_angle: f64,
    /// Target radial engagement in degrees
    pub engagement_angle: f64,
}

impl Default for PocketParams {
    fn default() -> Self {
        Self {
            strategy: PocketStrategy::default(),
            stock_mode: StockMode::default(),
            stock_clearance: 0.0,
            step_over: None,
            raster_angle: 0.0,
            engagement_angle: DEFAULT_ENGAGEMENT_ANGLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContourParams {
    /// Material left on the wall (mm)
    pub stock_clearance: f64,
    /// Climb milling (clockwise around the part) when true
    pub climb: bool,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            stock_clearance: 0.0,
            climb: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrillingParams {
    /// Hole centres
    pub locations: Vec<[f64; 2]>,
    /// Peck increment, 0 for a single plunge
    pub peck_depth: f64,
}

/// Per-kind parameter schema
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyParams {
    Pocket(PocketParams),
    Contour(ContourParams),
    Drilling(DrillingParams),
}

/// Complete parameter record of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationParams {
    pub cutting: CuttingParams,
    pub strategy: StrategyParams,
}

impl OperationParams {
    pub fn for_kind(kind: OperationKind) -> Self {
        let strategy = match kind {
            OperationKind::Pocket => StrategyParams::Pocket(PocketParams::default()),
            OperationKind::Contour => StrategyParams::Contour(ContourParams::default()),
            OperationKind::Drilling => StrategyParams::Drilling(DrillingParams::default()),
        };
        Self {
            cutting: CuttingParams::default(),
            strategy,
        }
    }

    pub fn pocket(&self) -> Option<&PocketParams> {
        match &self.strategy {
            StrategyParams::Pocket(p) => Some(p),
            _ => None,
        }
    }

    pub fn contour(&self) -> Option<&ContourParams> {
        match &self.strategy {
            StrategyParams::Contour(p) => Some(p),
            _ => None,
        }
    }

    pub fn drilling(&self) -> Option<&DrillingParams> {
        match &self.strategy {
            StrategyParams::Drilling(p) => Some(p),
            _ => None,
        }
    }

    /// Material left on the final surface, zero for drilling
    pub fn stock_clearance(&self) -> f64 {
        match &self.strategy {
            StrategyParams::Pocket(p) => p.stock_clearance,
            StrategyParams::Contour(p) => p.stock_clearance,
            StrategyParams::Drilling(_) => 0.0,
        }
    }
}

type Setter = fn(&mut OperationParams, &str, &ParamValue) -> Result<(), ParameterError>;

const COMMON: &[(&str, Setter)] = &[
    ("feedrate", set_feed_rate as Setter),
    ("horizfeed", set_feed_rate as Setter),
    ("plungerate", set_plunge_rate as Setter),
    ("vertfeed", set_plunge_rate as Setter),
    ("spindlespeed", set_spindle_speed as Setter),
    ("stepdown", set_step_down as Setter),
    ("safeheight", set_safe_height as Setter),
    ("finaldepth", set_final_depth as Setter),
];

const POCKET: &[(&str, Setter)] = &[
    ("stockclearance", set_stock_clearance as Setter),
    ("clearance", set_stock_clearance as Setter),
    ("stockmode", set_stock_mode as Setter),
    ("pocketstrategy", set_pocket_strategy as Setter),
    ("strategy", set_pocket_strategy as Setter),
    ("stepover", set_step_over as Setter),
    ("rasterangle", set_raster_angle as Setter),
    ("engagementangle", set_engagement_angle as Setter),
];

const CONTOUR: &[(&str, Setter)] = &[
    ("stockclearance", set_stock_clearance as Setter),
    ("clearance", set_stock_clearance as Setter),
    ("climb", set_climb as Setter),
    ("climbmilling", set_climb as Setter),
];

const DRILLING: &[(&str, Setter)] = &[
    ("locations", set_locations as Setter),
    ("holes", set_locations as Setter),
    ("peckdepth", set_peck_depth as Setter),
];

/// Lower-case and strip separators
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

fn setter_for(kind: OperationKind, name: &str) -> Option<Setter> {
    let table = match kind {
        OperationKind::Pocket => POCKET,
        OperationKind::Contour => CONTOUR,
        OperationKind::Drilling => DRILLING,
    };
    let key = normalize_name(name);
    table
        .iter()
        .chain(COMMON.iter())
        .find(|(n, _)| *n == key)
        .map(|(_, setter)| *setter)
}

/// Canonical names accepted by `kind`, aliases included
pub fn parameter_names(kind: OperationKind) -> Vec<&'static str> {
    let table = match kind {
        OperationKind::Pocket => POCKET,
        OperationKind::Contour => CONTOUR,
        OperationKind::Drilling => DRILLING,
    };
    COMMON.iter().chain(table.iter()).map(|(n, _)| *n).collect()
}

/// Apply one named parameter to `params`
///
/// The record is only modified when the value is accepted.
pub fn apply_parameter(
    kind: OperationKind,
    params: &mut OperationParams,
    name: &str,
    value: &ParamValue,
) -> Result<(), ParameterError> {
    let setter = setter_for(kind, name).ok_or_else(|| ParameterError::Unknown {
        name: name.to_string(),
        kind: kind.to_string(),
    })?;
    setter(params, name, value)
}

fn mismatch(name: &str, expected: &str, value: &ParamValue) -> ParameterError {
    ParameterError::TypeMismatch {
        name: name.to_string(),
        expected: expected.to_string(),
        found: value.type_name().to_string(),
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> ParameterError {
    ParameterError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn number(name: &str, value: &ParamValue) -> Result<f64, ParameterError> {
    let n = value
        .as_number()
        .ok_or_else(|| mismatch(name, "number", value))?;
    if !n.is_finite() {
        return Err(invalid(name, value, "must be finite"));
    }
    Ok(n)
}

fn positive(name: &str, value: &ParamValue) -> Result<f64, ParameterError> {
    let n = number(name, value)?;
    if n <= 0.0 {
        return Err(invalid(name, value, "must be greater than 0"));
    }
    Ok(n)
}

fn non_negative(name: &str, value: &ParamValue) -> Result<f64, ParameterError> {
    let n = number(name, value)?;
    if n < 0.0 {
        return Err(invalid(name, value, "must be 0 or greater"));
    }
    Ok(n)
}

fn boolean(name: &str, value: &ParamValue) -> Result<bool, ParameterError> {
    value.as_bool().ok_or_else(|| mismatch(name, "bool", value))
}

fn text<'v>(name: &str, value: &'v ParamValue) -> Result<&'v str, ParameterError> {
    value.as_text().ok_or_else(|| mismatch(name, "text", value))
}

fn pocket_mut<'p>(
    params: &'p mut OperationParams,
    name: &str,
) -> Result<&'p mut PocketParams, ParameterError> {
    match &mut params.strategy {
        StrategyParams::Pocket(p) => Ok(p),
        _ => Err(ParameterError::Unknown {
            name: name.to_string(),
            kind: "non-pocket".to_string(),
        }),
    }
}

fn set_feed_rate(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    p.cutting.feed_rate = Some(positive(name, v)?);
    Ok(())
}

fn set_plunge_rate(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    p.cutting.plunge_rate = Some(positive(name, v)?);
    Ok(())
}

fn set_spindle_speed(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    let rpm = positive(name, v)?;
    if rpm > u32::MAX as f64 {
        return Err(invalid(name, v, "exceeds the supported spindle range"));
    }
    p.cutting.spindle_speed = Some(rpm.round().max(1.0) as u32);
    Ok(())
}

fn set_step_down(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    p.cutting.step_down = Some(positive(name, v)?);
    Ok(())
}

fn set_safe_height(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    p.cutting.safe_height = non_negative(name, v)?;
    Ok(())
}

fn set_final_depth(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    p.cutting.final_depth = Some(number(name, v)?);
    Ok(())
}

fn set_stock_clearance(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    let clearance = non_negative(name, v)?;
    match &mut p.strategy {
        StrategyParams::Pocket(pocket) => pocket.stock_clearance = clearance,
        StrategyParams::Contour(contour) => contour.stock_clearance = clearance,
        StrategyParams::Drilling(_) => {
            return Err(ParameterError::Unknown {
                name: name.to_string(),
                kind: OperationKind::Drilling.to_string(),
            })
        }
    }
    Ok(())
}

fn set_stock_mode(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    let mode = match normalize_name(text(name, v)?).as_str() {
        "stock" => StockMode::Stock,
        "boundingbox" | "boundbox" | "bbox" => StockMode::BoundingBox,
        _ => return Err(invalid(name, v, "expected Stock or BoundingBox")),
    };
    pocket_mut(p, name)?.stock_mode = mode;
    Ok(())
}

fn set_pocket_strategy(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    let strategy = match normalize_name(text(name, v)?).as_str() {
        "zigzag" | "raster" => PocketStrategy::ZigZag,
        "contourparallel" | "offset" => PocketStrategy::ContourParallel,
        "adaptive" => PocketStrategy::Adaptive,
        _ => {
            return Err(invalid(
                name,
                v,
                "expected Adaptive, ZigZag, Raster, ContourParallel or Offset",
            ))
        }
    };
    pocket_mut(p, name)?.strategy = strategy;
    Ok(())
}

fn set_step_over(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    let percent = positive(name, v)?;
    if percent > 100.0 {
        return Err(invalid(name, v, "must be at most 100 percent"));
    }
    pocket_mut(p, name)?.step_over = Some(percent);
    Ok(())
}

fn set_raster_angle(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    pocket_mut(p, name)?.raster_angle = number(name, v)?;
    Ok(())
}

fn set_engagement_angle(
    p: &mut OperationParams,
    name: &str,
    v: &ParamValue,
) -> Result<(), ParameterError> {
    let angle = positive(name, v)?;
    if angle >= 180.0 {
        return Err(invalid(name, v, "must be below 180 degrees"));
    }
    pocket_mut(p, name)?.engagement_angle = angle;
    Ok(())
}

fn set_climb(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    let climb = boolean(name, v)?;
    match &mut p.strategy {
        StrategyParams::Contour(contour) => {
            contour.climb = climb;
            Ok(())
        }
        _ => Err(ParameterError::Unknown {
            name: name.to_string(),
            kind: "non-contour".to_string(),
        }),
    }
}

fn set_locations(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    let points = v
        .as_points()
        .ok_or_else(|| mismatch(name, "list of [x, y] points", v))?;
    if points.iter().flatten().any(|c| !c.is_finite()) {
        return Err(invalid(name, v, "coordinates must be finite"));
    }
    match &mut p.strategy {
        StrategyParams::Drilling(drilling) => {
            drilling.locations = points.to_vec();
            Ok(())
        }
        _ => Err(ParameterError::Unknown {
            name: name.to_string(),
            kind: "non-drilling".to_string(),
        }),
    }
}

fn set_peck_depth(p: &mut OperationParams, name: &str, v: &ParamValue) -> Result<(), ParameterError> {
    let peck = non_negative(name, v)?;
    match &mut p.strategy {
        StrategyParams::Drilling(drilling) => {
            drilling.peck_depth = peck;
            Ok(())
        }
        _ => Err(ParameterError::Unknown {
            name: name.to_string(),
            kind: "non-drilling".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pocket() -> OperationParams {
        OperationParams::for_kind(OperationKind::Pocket)
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Feed_Rate"), "feedrate");
        assert_eq!(normalize_name("step-over"), "stepover");
        assert_eq!(normalize_name("Stock Mode"), "stockmode");
    }

    #[test]
    fn test_aliases_share_a_field() {
        let mut p = pocket();
        apply_parameter(OperationKind::Pocket, &mut p, "HorizFeed", &1200.0.into()).unwrap();
        assert_eq!(p.cutting.feed_rate, Some(1200.0));
        apply_parameter(OperationKind::Pocket, &mut p, "feed_rate", &900.0.into()).unwrap();
        assert_eq!(p.cutting.feed_rate, Some(900.0));
        apply_parameter(OperationKind::Pocket, &mut p, "Clearance", &0.5.into()).unwrap();
        assert_eq!(p.stock_clearance(), 0.5);
    }

    #[test]
    fn test_enumerated_text_values() {
        let mut p = pocket();
        apply_parameter(OperationKind::Pocket, &mut p, "Strategy", &"Offset".into()).unwrap();
        apply_parameter(OperationKind::Pocket, &mut p, "StockMode", &"boundingbox".into())
            .unwrap();
        let pocket = p.pocket().unwrap();
        assert_eq!(pocket.strategy, PocketStrategy::ContourParallel);
        assert_eq!(pocket.stock_mode, StockMode::BoundingBox);

        let err = apply_parameter(OperationKind::Pocket, &mut p, "Strategy", &"Spiral".into())
            .unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { .. }));
        assert_eq!(p.pocket().unwrap().strategy, PocketStrategy::ContourParallel);
    }

    #[test]
    fn test_range_checks() {
        let mut p = pocket();
        for (name, value) in [
            ("FeedRate", 0.0),
            ("StepDown", -1.0),
            ("StepOver", 120.0),
            ("EngagementAngle", 180.0),
            ("SafeHeight", -2.0),
        ] {
            let err = apply_parameter(OperationKind::Pocket, &mut p, name, &value.into())
                .unwrap_err();
            assert!(matches!(err, ParameterError::InvalidValue { .. }), "{}", name);
        }
        assert_eq!(p, pocket());
    }

    #[test]
    fn test_kind_specific_names() {
        let mut p = OperationParams::for_kind(OperationKind::Drilling);
        let err =
            apply_parameter(OperationKind::Drilling, &mut p, "StepOver", &40.0.into()).unwrap_err();
        assert_eq!(
            err,
            ParameterError::Unknown {
                name: "StepOver".into(),
                kind: "Drilling".into()
            }
        );

        apply_parameter(
            OperationKind::Drilling,
            &mut p,
            "Holes",
            &vec![[1.0, 2.0], [3.0, 4.0]].into(),
        )
        .unwrap();
        assert_eq!(p.drilling().unwrap().locations.len(), 2);
    }

    #[test]
    fn test_type_mismatch() {
        let mut p = OperationParams::for_kind(OperationKind::Contour);
        let err = apply_parameter(OperationKind::Contour, &mut p, "Climb", &1.0.into()).unwrap_err();
        assert_eq!(
            err,
            ParameterError::TypeMismatch {
                name: "Climb".into(),
                expected: "bool".into(),
                found: "number".into()
            }
        );
        assert!(p.contour().unwrap().climb);
    }

    #[test]
    fn test_spindle_speed_rounds() {
        let mut p = pocket();
        apply_parameter(OperationKind::Pocket, &mut p, "SpindleSpeed", &17999.6.into()).unwrap();
        assert_eq!(p.cutting.spindle_speed, Some(18000));
    }
}
