use crate::error::{GeometryError, Result};
use crate::math::{Point2, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceEvaluation};

/// An infinite plane in 3D space.
///
/// Defined by an origin point and two orthonormal direction vectors
/// (`u_dir`, `v_dir`). The normal is `u_dir x v_dir`.
///
/// Parametric form: `P(u, v) = origin + u * u_dir + v * v_dir`.
#[derive(Debug, Clone)]
pub struct Plane {
    origin: Point3,
    u_dir: Vector3,
    v_dir: Vector3,
}

impl Plane {
    /// Creates a new plane from an origin and two direction vectors.
    ///
    /// `v_dir` is orthogonalized against `u_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the direction vectors are zero-length
    /// or parallel (degenerate plane).
    pub fn new(origin: Point3, u_dir: Vector3, v_dir: Vector3) -> Result<Self> {
        let u_dir = u_dir.try_normalize(TOLERANCE).ok_or(GeometryError::ZeroVector)?;
        let v_dir = (v_dir - u_dir * u_dir.dot(&v_dir))
            .try_normalize(TOLERANCE)
            .ok_or_else(|| GeometryError::Degenerate("plane directions are parallel".into()))?;
        Ok(Self { origin, u_dir, v_dir })
    }

    /// Returns the origin point of the plane.
    #[must_use]
    pub fn origin(&self) -> &Point3 {
        &self.origin
    }

    /// Returns the normal vector of the plane.
    #[must_use]
    pub fn plane_normal(&self) -> Vector3 {
        self.u_dir.cross(&self.v_dir)
    }
}

impl Surface for Plane {
    fn evaluate(&self, uv: &Point2) -> Result<SurfaceEvaluation> {
        Ok(SurfaceEvaluation {
            point: self.origin + self.u_dir * uv.x + self.v_dir * uv.y,
            du: self.u_dir,
            dv: self.v_dir,
            duu: Vector3::zeros(),
            duv: Vector3::zeros(),
            dvv: Vector3::zeros(),
        })
    }

    fn inverse(&self, point: &Point3) -> Point2 {
        let d = point - self.origin;
        Point2::new(d.dot(&self.u_dir), d.dot(&self.v_dir))
    }

    fn area_scale(&self) -> f64 {
        1.0
    }

    fn is_u_periodic(&self) -> bool {
        false
    }
}
