//! Toolpath segment types and data structures.

use nalgebra::Point3;

/// Types of toolpath segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
}

impl Motion {
    /// True for moves that remove material
    pub fn is_cutting(&self) -> bool {
        !matches!(self, Motion::Rapid)
    }

    pub fn is_arc(&self) -> bool {
        matches!(self, Motion::ArcCw | Motion::ArcCcw)
    }
}

/// A single tool movement.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionSegment {
    pub motion: Motion,
    pub start: Point3<f64>,
    pub end: Point3<f64>,
    /// Arc centre, set for arcs only
    pub center: Option<Point3<f64>>,
    /// mm/min; zero for rapids
    pub feed_rate: f64,
}

impl MotionSegment {
    pub fn rapid(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self {
            motion: Motion::Rapid,
            start,
            end,
            center: None,
            feed_rate: 0.0,
        }
    }

    pub fn linear(start: Point3<f64>, end: Point3<f64>, feed_rate: f64) -> Self {
        Self {
            motion: Motion::Linear,
            start,
            end,
            center: None,
            feed_rate,
        }
    }

    /// Creates a new arc segment. `motion` must be `ArcCw` or `ArcCcw`.
    pub fn arc(
        motion: Motion,
        start: Point3<f64>,
        end: Point3<f64>,
        center: Point3<f64>,
        feed_rate: f64,
    ) -> Self {
        debug_assert!(motion.is_arc());
        Self {
            motion,
            start,
            end,
            center: Some(center),
            feed_rate,
        }
    }

    /// Path length; arcs use their swept angle, Z change is added as a helix
    pub fn length(&self) -> f64 {
        match (self.motion, self.center) {
            (Motion::ArcCw | Motion::ArcCcw, Some(c)) => {
                let r = ((self.start.x - c.x).powi(2) + (self.start.y - c.y).powi(2)).sqrt();
                let sweep = self.sweep_angle().abs();
                let planar = r * sweep;
                (planar * planar + (self.end.z - self.start.z).powi(2)).sqrt()
            }
            _ => (self.end - self.start).norm(),
        }
    }

    /// Signed swept angle in radians, positive counter-clockwise
    ///
    /// Zero for non-arc segments. Coincident start and end give a full circle.
    pub fn sweep_angle(&self) -> f64 {
        let Some(c) = self.center else {
            return 0.0;
        };
        let a0 = (self.start.y - c.y).atan2(self.start.x - c.x);
        let a1 = (self.end.y - c.y).atan2(self.end.x - c.x);
        let tau = std::f64::consts::TAU;
        match self.motion {
            Motion::ArcCcw => {
                let mut sweep = (a1 - a0).rem_euclid(tau);
                if sweep <= 1e-12 {
                    sweep = tau;
                }
                sweep
            }
            Motion::ArcCw => {
                let mut sweep = (a0 - a1).rem_euclid(tau);
                if sweep <= 1e-12 {
                    sweep = tau;
                }
                -sweep
            }
            _ => 0.0,
        }
    }

    /// Point at fraction `t` in [0, 1] along the segment
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        let z = self.start.z + (self.end.z - self.start.z) * t;
        match (self.motion, self.center) {
            (Motion::ArcCw | Motion::ArcCcw, Some(c)) => {
                let r = ((self.start.x - c.x).powi(2) + (self.start.y - c.y).powi(2)).sqrt();
                let a0 = (self.start.y - c.y).atan2(self.start.x - c.x);
                let a = a0 + self.sweep_angle() * t;
                Point3::new(c.x + r * a.cos(), c.y + r * a.sin(), z)
            }
            _ => {
                let p = self.start + (self.end - self.start) * t;
                Point3::new(p.x, p.y, z)
            }
        }
    }
}
