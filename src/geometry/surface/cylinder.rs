use crate::error::{GeometryError, Result};
use crate::math::{Point2, Point3, Vector3, TOLERANCE};

use super::{Surface, SurfaceEvaluation};

/// A cylindrical surface in 3D space.
///
/// `P(u, v) = center + radius * cos(u) * ref_dir + radius * sin(u) * binormal + v * axis`
/// where `binormal = axis x ref_dir`.
///
/// `du x dv` points away from the axis.
#[derive(Debug, Clone)]
pub struct Cylinder {
    center: Point3,
    radius: f64,
    axis: Vector3,
    ref_dir: Vector3,
}

impl Cylinder {
    /// Creates a new cylinder.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, the axis is zero-length,
    /// or the reference direction is not perpendicular to the axis.
    pub fn new(center: Point3, radius: f64, axis: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(
                GeometryError::Degenerate("cylinder radius must be positive".into()).into(),
            );
        }
        let axis = axis.try_normalize(TOLERANCE).ok_or(GeometryError::ZeroVector)?;
        let ref_dir = ref_dir
            .try_normalize(TOLERANCE)
            .ok_or(GeometryError::ZeroVector)?;
        if axis.dot(&ref_dir).abs() > TOLERANCE {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to axis".into(),
            )
            .into());
        }
        Ok(Self {
            center,
            radius,
            axis,
            ref_dir,
        })
    }

    /// Returns the radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn binormal(&self) -> Vector3 {
        self.axis.cross(&self.ref_dir)
    }
}

impl Surface for Cylinder {
    fn evaluate(&self, uv: &Point2) -> Result<SurfaceEvaluation> {
        let (s, c) = uv.x.sin_cos();
        let binormal = self.binormal();
        let radial = self.ref_dir * c + binormal * s;
        Ok(SurfaceEvaluation {
            point: self.center + radial * self.radius + self.axis * uv.y,
            du: (binormal * c - self.ref_dir * s) * self.radius,
            dv: self.axis,
            duu: -radial * self.radius,
            duv: Vector3::zeros(),
            dvv: Vector3::zeros(),
        })
    }

    fn inverse(&self, point: &Point3) -> Point2 {
        let dp = point - self.center;
        let u = dp.dot(&self.binormal()).atan2(dp.dot(&self.ref_dir));
        Point2::new(u, dp.dot(&self.axis))
    }

    fn area_scale(&self) -> f64 {
        self.radius
    }

    fn is_u_periodic(&self) -> bool {
        true
    }
}
