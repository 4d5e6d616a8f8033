use crate::math::Vector3;

/// Slack on angle comparisons, in degrees.
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Angle in degrees between two tangent lines, ignoring direction.
///
/// Returns `0` when either vector has no length.
pub(crate) fn tangent_deviation(a: &Vector3, b: &Vector3) -> f64 {
    let (Some(a), Some(b)) = (a.try_normalize(f64::MIN_POSITIVE), b.try_normalize(f64::MIN_POSITIVE))
    else {
        return 0.0;
    };
    a.dot(&b).abs().clamp(0.0, 1.0).acos().to_degrees()
}

/// How far a dihedral winding angle is from flat, in degrees.
pub(crate) fn winding_deviation(winding: f64) -> f64 {
    (winding - 180.0).abs()
}

/// Whether a deviation is within the merge tolerance.
pub(crate) fn is_smooth(deviation: f64, angle: f64) -> bool {
    deviation <= angle + ANGLE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_and_antiparallel_are_smooth() {
        let x = Vector3::x();
        assert!(tangent_deviation(&x, &(x * 3.0)) < 1e-6);
        assert!(tangent_deviation(&x, &-x) < 1e-6);
        assert!((tangent_deviation(&x, &Vector3::y()) - 90.0).abs() < 1e-9);
        assert!(is_smooth(0.0, 0.0));
        assert!(!is_smooth(90.0, 89.0));
    }

    #[test]
    fn winding_measures_from_flat() {
        assert!((winding_deviation(90.0) - 90.0).abs() < 1e-12);
        assert!((winding_deviation(185.0) - 5.0).abs() < 1e-12);
    }
}
