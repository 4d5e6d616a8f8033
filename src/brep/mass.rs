//! Mass properties by quadrature at unit density.

use nalgebra::Matrix3;

use crate::error::{GeometryError, Result};
use crate::math::{Point2, Point3, Vector3};

/// Integral properties of a set of real entities.
///
/// Only the measure matching the entities is non-zero: `length` for edges,
/// `area` for faces, and `volume` (plus its bounding `area`) for a solid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub volume: f64,
    pub area: f64,
    pub length: f64,
    /// Center of gravity.
    pub center: Point3,
    /// Inertia tensor about `center`.
    pub inertia: Matrix3<f64>,
}

/// Three-point Gauss-Legendre rule on `[0, 1]`.
pub(super) const GAUSS_3: [(f64, f64); 3] = [
    (0.112_701_665_379_258_3, 5.0 / 18.0),
    (0.5, 8.0 / 18.0),
    (0.887_298_334_620_741_7, 5.0 / 18.0),
];

/// Seven-point degree-5 rule on a triangle as barycentric weights and
/// fraction of the triangle area.
const TRIANGLE_7: [([f64; 3], f64); 7] = [
    ([1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], 0.225),
    ([0.059_715_871_789_770, 0.470_142_064_105_115, 0.470_142_064_105_115], 0.132_394_152_788_506),
    ([0.470_142_064_105_115, 0.059_715_871_789_770, 0.470_142_064_105_115], 0.132_394_152_788_506),
    ([0.470_142_064_105_115, 0.470_142_064_105_115, 0.059_715_871_789_770], 0.132_394_152_788_506),
    ([0.797_426_985_353_087, 0.101_286_507_323_456, 0.101_286_507_323_456], 0.125_939_180_544_827),
    ([0.101_286_507_323_456, 0.797_426_985_353_087, 0.101_286_507_323_456], 0.125_939_180_544_827),
    ([0.101_286_507_323_456, 0.101_286_507_323_456, 0.797_426_985_353_087], 0.125_939_180_544_827),
];

/// Quadrature points of the signed triangle `(a, b, c)` as `(uv, weight)`.
///
/// Weights carry the sign of the triangle orientation.
pub(super) fn triangle_points(a: &Point2, b: &Point2, c: &Point2) -> impl Iterator<Item = (Point2, f64)> {
    let area = 0.5 * (b - a).perp(&(c - a));
    let (a, b, c) = (*a, *b, *c);
    TRIANGLE_7.iter().map(move |&([wa, wb, wc], w)| {
        (Point2::from(a.coords * wa + b.coords * wb + c.coords * wc), w * area)
    })
}

/// Zeroth, first and second moments of a mass distribution.
#[derive(Debug, Clone, Copy)]
pub(super) struct Moments {
    m0: f64,
    m1: Vector3,
    m2: Matrix3<f64>,
}

impl Default for Moments {
    fn default() -> Self {
        Self {
            m0: 0.0,
            m1: Vector3::zeros(),
            m2: Matrix3::zeros(),
        }
    }
}

impl Moments {
    /// Adds a point mass.
    pub(super) fn add(&mut self, weight: f64, p: &Point3) {
        self.m0 += weight;
        self.m1 += p.coords * weight;
        self.m2 += p.coords * p.coords.transpose() * weight;
    }

    /// Adds the volume enclosed behind a surface element with outward unit
    /// normal `n`, by the divergence theorem.
    pub(super) fn add_enclosed(&mut self, weight: f64, p: &Point3, n: &Vector3) {
        let x = p.coords;
        self.m0 += weight * x.dot(n) / 3.0;
        for i in 0..3 {
            self.m1[i] += weight * x[i] * x[i] * n[i] / 2.0;
            for j in 0..3 {
                self.m2[(i, j)] += if i == j {
                    weight * x[i] * x[i] * x[i] * n[i] / 3.0
                } else {
                    weight * x[i] * x[i] * x[j] * n[i] / 2.0
                };
            }
        }
    }

    pub(super) fn mass(&self) -> f64 {
        self.m0
    }

    /// Center of gravity and inertia tensor about it.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Degenerate`] for a distribution without mass.
    pub(super) fn center_and_inertia(&self) -> Result<(Point3, Matrix3<f64>)> {
        if self.m0.abs() < f64::MIN_POSITIVE {
            return Err(GeometryError::Degenerate("entities have no mass".into()).into());
        }
        let c = self.m1 / self.m0;
        let m2 = (self.m2 + self.m2.transpose()) * 0.5;
        let central = m2 - c * c.transpose() * self.m0;
        let inertia = Matrix3::identity() * central.trace() - central;
        Ok((Point3::from(c), inertia))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn rules_integrate_polynomials() {
        let gauss: f64 = GAUSS_3.iter().map(|(t, w)| w * t.powi(5)).sum();
        assert_relative_eq!(gauss, 1.0 / 6.0, epsilon = 1e-12);

        let (a, b, c) = (Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(0.0, 1.0));
        let area: f64 = triangle_points(&a, &b, &c).map(|(_, w)| w).sum();
        assert_relative_eq!(area, 0.5, epsilon = 1e-12);
        // integral of x^2 y over the unit right triangle is 1/60
        let cubic: f64 = triangle_points(&a, &b, &c).map(|(p, w)| w * p.x * p.x * p.y).sum();
        assert_relative_eq!(cubic, 1.0 / 60.0, epsilon = 1e-12);
        let flipped: f64 = triangle_points(&a, &c, &b).map(|(_, w)| w).sum();
        assert_relative_eq!(flipped, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn rod_inertia() {
        let mut m = Moments::default();
        for &(t, w) in &GAUSS_3 {
            m.add(w * 2.0, &Point3::new(2.0 * t, 0.0, 0.0));
        }
        assert_relative_eq!(m.mass(), 2.0, epsilon = 1e-12);
        let (c, inertia) = m.center_and_inertia().unwrap();
        assert_relative_eq!(c.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(0, 0)], 0.0, epsilon = 1e-12);
        // m L^2 / 12
        assert_relative_eq!(inertia[(1, 1)], 2.0 * 4.0 / 12.0, epsilon = 1e-12);
        assert_relative_eq!(inertia[(2, 2)], 2.0 * 4.0 / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_distribution_is_degenerate() {
        assert!(Moments::default().center_and_inertia().is_err());
    }
}
