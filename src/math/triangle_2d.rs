use super::Point2;

/// Tolerance on barycentric weights when classifying a point as inside.
pub const INSIDE_TOLERANCE: f64 = 1e-10;

/// Barycentric weights of `p` with respect to triangle `(a, b, c)`.
///
/// Returns `None` for a degenerate (zero-area) triangle.
#[must_use]
pub fn barycentric(a: &Point2, b: &Point2, c: &Point2, p: &Point2) -> Option<[f64; 3]> {
    let det = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    if det.abs() < f64::MIN_POSITIVE {
        return None;
    }
    let w1 = ((b.x - p.x) * (c.y - p.y) - (c.x - p.x) * (b.y - p.y)) / det;
    let w2 = ((c.x - p.x) * (a.y - p.y) - (a.x - p.x) * (c.y - p.y)) / det;
    Some([w1, w2, 1.0 - w1 - w2])
}

/// Smallest barycentric weight; non-negative means inside.
#[must_use]
pub fn min_weight(w: &[f64; 3]) -> f64 {
    w[0].min(w[1]).min(w[2])
}

/// Result of locating a point in a 2D triangulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Index of the triangle.
    pub tri: usize,
    /// Barycentric weights of the point in that triangle.
    pub weights: [f64; 3],
    /// `false` when no triangle contains the point and the least-negative
    /// triangle was used for extrapolation.
    pub inside: bool,
}

/// Locates `p` in a triangulation, trying `hint` first.
///
/// Falls back to the triangle whose smallest barycentric weight is the
/// largest (the "least negative" one), so points slightly outside the
/// mesh still extrapolate smoothly.
#[must_use]
pub fn locate(
    uvs: &[Point2],
    tris: &[[usize; 3]],
    p: &Point2,
    hint: Option<usize>,
) -> Option<TriangleHit> {
    let weights_of = |t: usize| -> Option<[f64; 3]> {
        let [i0, i1, i2] = *tris.get(t)?;
        barycentric(uvs.get(i0)?, uvs.get(i1)?, uvs.get(i2)?, p)
    };

    if let Some(t) = hint {
        if let Some(w) = weights_of(t) {
            if min_weight(&w) >= -INSIDE_TOLERANCE {
                return Some(TriangleHit { tri: t, weights: w, inside: true });
            }
        }
    }

    let mut best: Option<TriangleHit> = None;
    for t in 0..tris.len() {
        let Some(w) = weights_of(t) else { continue };
        let m = min_weight(&w);
        if m >= -INSIDE_TOLERANCE {
            return Some(TriangleHit { tri: t, weights: w, inside: true });
        }
        if best.is_none_or(|b| m > min_weight(&b.weights)) {
            best = Some(TriangleHit { tri: t, weights: w, inside: false });
        }
    }
    best
}
