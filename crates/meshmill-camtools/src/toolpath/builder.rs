//! Incremental motion construction shared by the planners.

use super::segment::{Motion, MotionSegment};
use nalgebra::Point3;

/// Height above remaining material where rapid approach ends and plunging starts
pub const APPROACH_CLEARANCE: f64 = 1.0;

const EPS: f64 = 1e-9;

/// Appends connected segments, tracking the current tool position.
///
/// Every move starts where the previous one ended. Moves of zero length are
/// dropped.
#[derive(Debug, Clone)]
pub struct MotionBuilder {
    segments: Vec<MotionSegment>,
    pos: Point3<f64>,
    safe_z: f64,
    feed_rate: f64,
    plunge_rate: f64,
}

impl MotionBuilder {
    pub fn new(start: Point3<f64>, safe_z: f64, feed_rate: f64, plunge_rate: f64) -> Self {
        Self {
            segments: Vec::new(),
            pos: start,
            safe_z,
            feed_rate,
            plunge_rate,
        }
    }

    pub fn position(&self) -> Point3<f64> {
        self.pos
    }

    pub fn safe_z(&self) -> f64 {
        self.safe_z
    }

    pub fn rapid_to(&mut self, p: Point3<f64>) {
        self.push(MotionSegment::rapid(self.pos, p));
    }

    /// Linear move at the cutting feed
    pub fn cut_to(&mut self, p: Point3<f64>) {
        self.push(MotionSegment::linear(self.pos, p, self.feed_rate));
    }

    /// Vertical linear move at the plunge feed
    pub fn plunge_to(&mut self, z: f64) {
        let end = Point3::new(self.pos.x, self.pos.y, z);
        self.push(MotionSegment::linear(self.pos, end, self.plunge_rate));
    }

    /// Circular move in the XY plane at the cutting feed
    pub fn arc_to(&mut self, end: Point3<f64>, center: Point3<f64>, clockwise: bool) {
        let motion = if clockwise {
            Motion::ArcCw
        } else {
            Motion::ArcCcw
        };
        let center = Point3::new(center.x, center.y, self.pos.z);
        self.push(MotionSegment::arc(motion, self.pos, end, center, self.feed_rate));
    }

    /// Rapid straight up (or down) to the safe height
    pub fn retract(&mut self) {
        let p = Point3::new(self.pos.x, self.pos.y, self.safe_z);
        self.rapid_to(p);
    }

    /// Move to a new cut start through the safe height
    ///
    /// Retracts, rapids across at the safe height, rapids down to
    /// `clear_z` and plunges at the plunge feed to `target.z`.
    pub fn travel_to(&mut self, target: Point3<f64>, clear_z: f64) {
        self.retract();
        self.rapid_to(Point3::new(target.x, target.y, self.safe_z));
        let approach = clear_z.min(self.safe_z).max(target.z);
        self.rapid_to(Point3::new(target.x, target.y, approach));
        self.plunge_to(target.z);
    }

    /// True once any material-removing move was added
    pub fn has_cutting(&self) -> bool {
        self.segments.iter().any(|s| s.motion.is_cutting())
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Retract and return the segments
    pub fn finish(mut self) -> Vec<MotionSegment> {
        if !self.segments.is_empty() {
            self.retract();
        }
        self.segments
    }

    fn push(&mut self, segment: MotionSegment) {
        if (segment.end - segment.start).norm() <= EPS && !segment.motion.is_arc() {
            return;
        }
        self.pos = segment.end;
        self.segments.push(segment);
    }
}

/// Drop interior points lying on the line through their neighbours
pub fn simplify_collinear(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = vec![points[0]];
    for i in 1..points.len() - 1 {
        let a = out[out.len() - 1];
        let b = points[i];
        let c = points[i + 1];
        let ab = b - a;
        let ac = c - a;
        if ab.norm() > EPS && ab.cross(&ac).norm() > 1e-9 * ac.norm().max(1.0) {
            out.push(b);
        }
    }
    out.push(points[points.len() - 1]);
    out
}
