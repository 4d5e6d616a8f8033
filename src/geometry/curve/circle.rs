use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};

use super::{Curve, CurveEvaluation};

/// A circle in 3D space, used for arcs by restricting the parameter range.
///
/// `P(t) = center + radius * cos(t) * ref_dir + radius * sin(t) * binormal`
/// where `binormal = normal x ref_dir`.
#[derive(Debug, Clone)]
pub struct Circle {
    center: Point3,
    radius: f64,
    normal: Vector3,
    ref_dir: Vector3,
}

impl Circle {
    /// Creates a new circle.
    ///
    /// # Errors
    ///
    /// Returns an error if the radius is non-positive, a direction is
    /// zero-length, or `ref_dir` is not perpendicular to `normal`.
    pub fn new(center: Point3, radius: f64, normal: Vector3, ref_dir: Vector3) -> Result<Self> {
        if radius < TOLERANCE {
            return Err(GeometryError::Degenerate("circle radius must be positive".into()).into());
        }
        let normal = normal
            .try_normalize(TOLERANCE)
            .ok_or(GeometryError::ZeroVector)?;
        let ref_dir = ref_dir
            .try_normalize(TOLERANCE)
            .ok_or(GeometryError::ZeroVector)?;
        if normal.dot(&ref_dir).abs() > TOLERANCE {
            return Err(GeometryError::Degenerate(
                "reference direction must be perpendicular to normal".into(),
            )
            .into());
        }
        Ok(Self {
            center,
            radius,
            normal,
            ref_dir,
        })
    }

    /// Returns the center of the circle.
    #[must_use]
    pub fn center(&self) -> &Point3 {
        &self.center
    }

    /// Returns the radius of the circle.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn binormal(&self) -> Vector3 {
        self.normal.cross(&self.ref_dir)
    }
}

impl Curve for Circle {
    fn evaluate(&self, t: f64) -> Result<CurveEvaluation> {
        let (s, c) = t.sin_cos();
        let binormal = self.binormal();
        let radial = self.ref_dir * c + binormal * s;
        Ok(CurveEvaluation {
            point: self.center + radial * self.radius,
            d1: (binormal * c - self.ref_dir * s) * self.radius,
            d2: -radial * self.radius,
        })
    }

    fn inverse(&self, point: &Point3) -> f64 {
        let dp = point - self.center;
        dp.dot(&self.binormal()).atan2(dp.dot(&self.ref_dir))
    }

    fn arc_length(&self, t1: f64, t2: f64) -> f64 {
        self.radius * (t2 - t1).abs()
    }

    fn is_periodic(&self) -> bool {
        true
    }
}
