mod circle;
mod line;

pub use circle::Circle;
pub use line::Line;

use crate::error::Result;
use crate::math::{Point3, Vector3};

/// Point and derivatives of a curve at one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveEvaluation {
    /// Position.
    pub point: Point3,
    /// First derivative with respect to the parameter.
    pub d1: Vector3,
    /// Second derivative with respect to the parameter.
    pub d2: Vector3,
}

/// Trait for parametric curves in 3D space.
pub trait Curve {
    /// Evaluates the curve and its first two derivatives at parameter `t`.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails.
    fn evaluate(&self, t: f64) -> Result<CurveEvaluation>;

    /// Returns the parameter of the point on the curve closest to `point`.
    ///
    /// Periodic curves return a value in `(-pi, pi]`; callers unwrap it into
    /// their own range.
    fn inverse(&self, point: &Point3) -> f64;

    /// Length of the curve between `t1` and `t2`.
    fn arc_length(&self, t1: f64, t2: f64) -> f64;

    /// Returns whether the curve is periodic.
    fn is_periodic(&self) -> bool;
}
