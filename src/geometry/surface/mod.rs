mod cylinder;
mod plane;

pub use cylinder::Cylinder;
pub use plane::Plane;

use crate::error::Result;
use crate::math::{Point2, Point3, Vector3};

/// Point and partial derivatives of a surface at one `(u, v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceEvaluation {
    pub point: Point3,
    pub du: Vector3,
    pub dv: Vector3,
    pub duu: Vector3,
    pub duv: Vector3,
    pub dvv: Vector3,
}

impl SurfaceEvaluation {
    /// Unnormalized normal `du x dv`.
    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.du.cross(&self.dv)
    }
}

/// Trait for parametric surfaces in 3D space.
pub trait Surface {
    /// Evaluates the surface and its partial derivatives at `uv`.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluation fails.
    fn evaluate(&self, uv: &Point2) -> Result<SurfaceEvaluation>;

    /// Returns the parameters of the point on the surface closest to `point`.
    ///
    /// Periodic directions return values in `(-pi, pi]`.
    fn inverse(&self, point: &Point3) -> Point2;

    /// Constant area scale `|du x dv|` for developable surfaces.
    fn area_scale(&self) -> f64;

    /// Whether `u` is an angular (periodic) parameter.
    fn is_u_periodic(&self) -> bool;
}
