//! Stock material derivation
//!
//! The stock is the raw block the machine starts from: the model's bounding
//! box grown by a margin on every face.

use crate::bounds::BoundingBox;
use meshmill_core::StockError;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Represents the stock material dimensions and position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    /// Minimum corner in world coordinates
    pub origin: Point3<f64>,
    /// Size along X (mm)
    pub length: f64,
    /// Size along Y (mm)
    pub width: f64,
    /// Size along Z (mm)
    pub height: f64,
}

impl Stock {
    pub fn extents(&self) -> Vector3<f64> {
        Vector3::new(self.length, self.width, self.height)
    }

    /// Corner opposite the origin
    pub fn max_corner(&self) -> Point3<f64> {
        self.origin + self.extents()
    }

    /// Get the top surface Z coordinate
    pub fn top_z(&self) -> f64 {
        self.origin.z + self.height
    }

    pub fn bottom_z(&self) -> f64 {
        self.origin.z
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.origin, self.max_corner())
    }

    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.bounds().contains_box(other)
    }

    /// Check if an XY position lies over the stock
    pub fn contains_xy(&self, x: f64, y: f64) -> bool {
        x >= self.origin.x
            && x <= self.origin.x + self.length
            && y >= self.origin.y
            && y <= self.origin.y + self.width
    }
}

/// Derive the stock block enclosing `bounds` with `margin` on every face
pub fn build_stock(bounds: &BoundingBox, margin: f64) -> Result<Stock, StockError> {
    if !margin.is_finite() || margin < 0.0 {
        return Err(StockError::InvalidMargin { margin });
    }

    let extents = bounds.extents();
    Ok(Stock {
        origin: bounds.min() - Vector3::repeat(margin),
        length: extents.x + 2.0 * margin,
        width: extents.y + 2.0 * margin,
        height: extents.z + 2.0 * margin,
    })
}
