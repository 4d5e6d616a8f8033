use super::Point2;

/// Computes the signed area of a closed polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Even-odd containment test of `p` against a set of closed polygons.
///
/// Holes are handled naturally: a point inside an outer loop and inside
/// one hole crosses an even number of boundaries.
#[must_use]
pub fn contains_point(loops: &[Vec<Point2>], p: &Point2) -> bool {
    let mut inside = false;
    for poly in loops {
        let n = poly.len();
        if n < 3 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (a, b) = (&poly[i], &poly[j]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Vec<Point2> {
        vec![
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0),
            Point2::new(x0 + size, y0 + size),
            Point2::new(x0, y0 + size),
        ]
    }

    #[test]
    fn ccw_square_area_positive() {
        assert!((signed_area(&square(0.0, 0.0, 2.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn cw_square_area_negative() {
        let mut sq = square(0.0, 0.0, 1.0);
        sq.reverse();
        assert!((signed_area(&sq) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_area_is_zero() {
        assert!(signed_area(&[Point2::origin(), Point2::new(1.0, 0.0)]).abs() < 1e-15);
    }

    #[test]
    fn contains_with_hole() {
        let loops = vec![square(0.0, 0.0, 3.0), square(1.0, 1.0, 1.0)];
        assert!(contains_point(&loops, &Point2::new(0.5, 0.5)));
        assert!(!contains_point(&loops, &Point2::new(1.5, 1.5)));
        assert!(!contains_point(&loops, &Point2::new(4.0, 1.5)));
    }
}
